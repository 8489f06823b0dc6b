use serde::{Deserialize, Serialize};

use crate::processing::benchmark::{BenchmarkRequest, ThresholdReport};
use crate::processing::matching::{MatchRequest, MatchResponse};

pub mod benchmark;
pub mod embedding;
pub mod matching;
pub mod relevance;
pub mod selection;

#[derive(Deserialize, Serialize, Debug)]
pub enum ZMQMessage {
    Match(MatchRequest),
    Similarity((String, String)),
    Benchmark(BenchmarkRequest),
}

#[derive(Deserialize, Serialize, Debug)]
pub enum ZMQReply {
    Match(MatchResponse),
    Similarity(Option<f32>),
    Benchmark(Vec<ThresholdReport>),
    Error(String),
}
