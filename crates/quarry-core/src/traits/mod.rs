mod encoder;
mod query_processor;
mod reranker;
mod tokenizer;

pub use encoder::IEncoder;
pub use query_processor::IQueryProcessor;
pub use reranker::IReranker;
pub use tokenizer::ITokenizer;
