/// One rewriting step applied to a query before it is encoded or tokenized.
pub trait IQueryProcessor: Send + Sync {
    fn process(&self, query: &str) -> String;

    fn name(&self) -> &str;
}
