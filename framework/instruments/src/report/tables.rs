use tabled::Tabled;

#[derive(Tabled)]
pub struct TrendRow {
    pub metric: String,
    #[tabled(display = "float2")]
    pub avg: f64,
    #[tabled(display = "float2")]
    pub min: f64,
    #[tabled(display = "float2")]
    pub med: f64,
    #[tabled(display = "float2")]
    pub max: f64,
    #[tabled(rename = "p(90)", display = "float2")]
    pub p90: f64,
    #[tabled(rename = "p(95)", display = "float2")]
    pub p95: f64,
    #[tabled(rename = "p(99)", display = "float2")]
    pub p99: f64,
    pub count: u64,
}

#[derive(Tabled)]
pub struct ValueRow {
    pub metric: String,
    #[tabled(rename = "type")]
    pub kind: String,
    pub value: String,
    pub detail: String,
}

#[derive(Tabled)]
pub struct ThresholdRow {
    pub metric: String,
    pub threshold: String,
    #[tabled(display = "observed")]
    pub observed: Option<f64>,
    pub result: String,
}

fn float2(n: &f64) -> String {
    format!("{:.2}", n)
}

fn observed(value: &Option<f64>) -> String {
    match value {
        Some(v) => format!("{:.4}", v),
        None => "-".to_string(),
    }
}
