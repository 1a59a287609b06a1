use quarry_core::config::DistanceMetric;

/// Normalize in place for cosine; other metrics store raw vectors.
///
/// Zero vectors stay zero and score 0 against everything.
pub fn prepare(metric: DistanceMetric, v: &mut [f32]) {
    if metric != DistanceMetric::Cosine {
        return;
    }
    let norm = v.iter().map(|x| (*x as f64) * (*x as f64)).sum::<f64>().sqrt();
    if norm == 0.0 {
        return;
    }
    for x in v.iter_mut() {
        *x = (*x as f64 / norm) as f32;
    }
}

/// Similarity of two prepared vectors; higher is closer.
pub fn score(metric: DistanceMetric, a: &[f32], b: &[f32]) -> f64 {
    match metric {
        DistanceMetric::Cosine | DistanceMetric::InnerProduct => dot(a, b),
        DistanceMetric::L2 => -squared_distance(a, b),
    }
}

fn dot(a: &[f32], b: &[f32]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (*x as f64) * (*y as f64)).sum()
}

fn squared_distance(a: &[f32], b: &[f32]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = (*x as f64) - (*y as f64);
            d * d
        })
        .sum()
}
