mod common;

use common::{
    FakeImageEmbedder, FakeImageSource, FakeTextEmbedder, at_similarity, keyword_axis, matcher,
};
use ssadagu_matcher::domain::match_result::{MatchReason, MatchResult, ScoreError};
use ssadagu_matcher::domain::product::ProductCandidate;
use ssadagu_matcher::models::config::{ImageFallback, MatcherConfig};
use ssadagu_matcher::processing::benchmark::{
    BenchmarkRequest, LabeledPair, process_benchmark_message,
};
use ssadagu_matcher::processing::matching::MatchRequest;
use ssadagu_matcher::processing::selection::SelectionReason;
use ssadagu_matcher::processing::{ZMQMessage, ZMQReply};

const KEYWORD: &str = "콜라겐마스크팩";

fn candidate(id: u32, title: &str) -> ProductCandidate {
    ProductCandidate::new(format!("https://ssadagu.kr/shop/view.php?num_iid={id}"), title)
}

fn request(candidates: Vec<ProductCandidate>) -> MatchRequest {
    MatchRequest {
        keyword: KEYWORD.to_string(),
        candidates,
        reference_image_urls: vec![],
    }
}

#[tokio::test]
async fn single_exact_match_is_selected_and_placeholders_skipped() {
    let text = FakeTextEmbedder::default()
        .with(KEYWORD, keyword_axis())
        .with("히알루론산 수분 앰플", at_similarity(0.3))
        .with("콜라겐마스크팩 100장", at_similarity(0.1));
    let mut matcher = matcher(
        MatcherConfig::text_only(0.5),
        text,
        None,
        FakeImageSource::default(),
    );

    let response = matcher
        .process_match_request(request(vec![
            candidate(1, "히알루론산 수분 앰플"),
            candidate(2, "제목 없음"),
            candidate(3, "콜라겐마스크팩 100장"),
            candidate(4, ""),
        ]))
        .await;

    assert_eq!(response.results.len(), 2);
    assert_eq!(response.stats.candidates_received, 4);
    assert_eq!(response.stats.skipped_placeholder_title, 2);
    assert!(!response.results[0].result.is_related);
    assert!(matches!(
        response.results[0].result.reason,
        MatchReason::BelowThreshold(s) if (s - 0.3).abs() < 1e-4
    ));
    assert_eq!(
        response.results[1].result,
        MatchResult::related(MatchReason::KeywordExactMatch)
    );

    let selected = response.selected_candidate().expect("a product is selected");
    assert_eq!(selected.title, "콜라겐마스크팩 100장");
    assert_eq!(
        response.selected.map(|s| s.reason),
        Some(SelectionReason::SingleKeywordMatch)
    );
}

#[tokio::test]
async fn several_exact_matches_select_closest_title() {
    let text = FakeTextEmbedder::default()
        .with(KEYWORD, keyword_axis())
        .with("콜라겐마스크팩 10매", at_similarity(0.4))
        .with("프리미엄 콜라겐마스크팩", at_similarity(0.9));
    let mut matcher = matcher(
        MatcherConfig::text_only(0.5),
        text,
        None,
        FakeImageSource::default(),
    );

    let response = matcher
        .process_match_request(request(vec![
            candidate(1, "콜라겐마스크팩 10매"),
            candidate(2, "프리미엄 콜라겐마스크팩"),
        ]))
        .await;

    assert_eq!(response.stats.exact_matches, 2);
    let selection = response.selected.expect("a product is selected");
    assert_eq!(selection.index, 1);
    assert!(matches!(selection.reason, SelectionReason::BestKeywordMatch(s) if s > 0.85));
}

#[tokio::test]
async fn best_text_similarity_selected_without_keyword_match() {
    let text = FakeTextEmbedder::default()
        .with(KEYWORD, keyword_axis())
        .with("콜라겐 얼굴 빛나는 마스크 수분 팩", at_similarity(0.82))
        .with("프리미엄 콜라겐 페이셜 마스크 10매", at_similarity(0.71))
        .with("천연 허브 클렌징 폼", at_similarity(0.2));
    let mut matcher = matcher(
        MatcherConfig::text_only(0.6),
        text,
        None,
        FakeImageSource::default(),
    );

    let response = matcher
        .process_match_request(request(vec![
            candidate(1, "프리미엄 콜라겐 페이셜 마스크 10매"),
            candidate(2, "천연 허브 클렌징 폼"),
            candidate(3, "콜라겐 얼굴 빛나는 마스크 수분 팩"),
        ]))
        .await;

    assert_eq!(response.stats.text_matches, 2);
    assert_eq!(response.stats.below_threshold, 1);
    assert_eq!(response.stats.text_embeddings_generated, 4);
    let selected = response.selected_candidate().expect("a product is selected");
    assert_eq!(selected.title, "콜라겐 얼굴 빛나는 마스크 수분 팩");
}

#[tokio::test]
async fn nothing_selected_when_all_below_threshold() {
    let text = FakeTextEmbedder::default()
        .with(KEYWORD, keyword_axis())
        .with("비타민C 브라이트닝 마스크", at_similarity(0.45));
    let mut matcher = matcher(
        MatcherConfig::text_only(0.6),
        text,
        None,
        FakeImageSource::default(),
    );

    let response = matcher
        .process_match_request(request(vec![candidate(1, "비타민C 브라이트닝 마스크")]))
        .await;

    assert!(response.selected.is_none());
    assert!(!response.results[0].result.is_related);
}

#[tokio::test]
async fn embedding_failure_keeps_exact_matches() {
    let mut matcher = matcher(
        MatcherConfig::text_only(0.5),
        FakeTextEmbedder::failing(),
        None,
        FakeImageSource::default(),
    );

    let response = matcher
        .process_match_request(request(vec![
            candidate(1, "콜라겐마스크팩 대용량"),
            candidate(2, "프리미엄 골드 페이셜 시트"),
        ]))
        .await;

    assert_eq!(
        response.results[0].result,
        MatchResult::related(MatchReason::KeywordExactMatch)
    );
    assert_eq!(
        response.results[1].result,
        MatchResult::rejected(ScoreError::NoEmbeddingSignal)
    );
    assert_eq!(response.stats.text_embeddings_generated, 0);
    assert_eq!(response.selected.map(|s| s.index), Some(0));
}

#[tokio::test]
async fn empty_keyword_rejects_every_candidate_without_embedding() {
    let mut matcher = matcher(
        MatcherConfig::text_only(0.5),
        FakeTextEmbedder::default(),
        None,
        FakeImageSource::default(),
    );

    let response = matcher
        .process_match_request(MatchRequest {
            keyword: "   ".to_string(),
            candidates: vec![candidate(1, "운동화"), candidate(2, "슬리퍼")],
            reference_image_urls: vec![],
        })
        .await;

    assert!(
        response
            .results
            .iter()
            .all(|m| m.result == MatchResult::rejected(ScoreError::EmptyInput))
    );
    assert_eq!(response.stats.rejected, 2);
    assert_eq!(matcher.text_embedder_mut().calls, 0);
}

fn image_request() -> MatchRequest {
    MatchRequest {
        keyword: "블루투스이어폰".to_string(),
        candidates: vec![
            candidate(1, "무선 블루투스 헤드폰 TWS").with_images(vec![
                "//img.example.com/tws.jpg".to_string(),
            ]),
            candidate(2, "갤럭시 버즈 호환 헤드셋").with_images(vec![
                "//img.example.com/headset.jpg".to_string(),
            ]),
            candidate(3, "아이폰 충전기 케이블").with_images(vec![
                "//img.example.com/cable.jpg".to_string(),
            ]),
        ],
        reference_image_urls: vec![
            "https://img.example.com/ref-1.jpg".to_string(),
            "https://img.example.com/ref-2.jpg".to_string(),
        ],
    }
}

fn image_text_embedder() -> FakeTextEmbedder {
    FakeTextEmbedder::default()
        .with("블루투스이어폰", keyword_axis())
        .with("무선 블루투스 헤드폰 TWS", at_similarity(0.65))
        .with("갤럭시 버즈 호환 헤드셋", at_similarity(0.7))
        .with("아이폰 충전기 케이블", at_similarity(0.3))
}

fn image_source() -> FakeImageSource {
    FakeImageSource::default()
        .with("https://img.example.com/ref-1.jpg", b"ref-1")
        .with("https://img.example.com/ref-2.jpg", b"ref-2")
        .with("https://img.example.com/tws.jpg", b"tws")
        .with("https://img.example.com/headset.jpg", b"headset")
        .with("https://img.example.com/cable.jpg", b"cable")
}

fn image_embedder() -> FakeImageEmbedder {
    FakeImageEmbedder::default()
        .with(b"ref-1", vec![1.0, 0.0])
        .with(b"ref-2", vec![0.9, 0.1])
        .with(b"tws", vec![0.95, 0.05])
        .with(b"headset", vec![0.1, 1.0])
}

#[tokio::test]
async fn image_gate_combines_scores_and_rejects_low_image_similarity() {
    let mut matcher = matcher(
        MatcherConfig::with_images(0.6),
        image_text_embedder(),
        Some(image_embedder()),
        image_source(),
    );

    let response = matcher.process_match_request(image_request()).await;

    let tws = response.results[0].result;
    assert!(tws.is_related);
    assert!(matches!(tws.reason, MatchReason::CombinedScore(s) if s > 0.75 && s <= 1.0));

    let headset = response.results[1].result;
    assert!(!headset.is_related);
    assert!(matches!(headset.reason, MatchReason::BelowThreshold(s) if s < 0.25));

    let cable = response.results[2].result;
    assert!(matches!(cable.reason, MatchReason::BelowThreshold(s) if (s - 0.3).abs() < 1e-4));

    assert_eq!(response.stats.image_matches, 1);
    assert_eq!(response.selected.map(|s| s.index), Some(0));
}

#[tokio::test]
async fn images_fetched_only_after_text_gate_and_reference_once() {
    let source = image_source();
    let mut matcher = matcher(
        MatcherConfig::with_images(0.6),
        image_text_embedder(),
        Some(image_embedder()),
        source,
    );

    let response = matcher.process_match_request(image_request()).await;
    assert_eq!(response.results.len(), 3);

    let requested = matcher.image_source().requested();
    assert_eq!(
        requested
            .iter()
            .filter(|url| url.contains("ref-1"))
            .count(),
        1
    );
    assert!(!requested.iter().any(|url| url.contains("cable")));
}

#[tokio::test]
async fn missing_image_features_fall_back_to_text() {
    let mut matcher = matcher(
        MatcherConfig::with_images(0.6),
        image_text_embedder(),
        Some(image_embedder()),
        FakeImageSource::default(),
    );

    let response = matcher.process_match_request(image_request()).await;

    let tws = response.results[0].result;
    assert!(tws.is_related);
    assert!(matches!(tws.reason, MatchReason::TextSimilarity(s) if (s - 0.65).abs() < 1e-4));
    assert!(response.results[1].result.is_related);
    assert_eq!(response.stats.image_fetch_failures, 4);
    assert_eq!(response.stats.image_decode_failures, 0);
}

#[tokio::test]
async fn missing_image_features_reject_when_configured() {
    let config = MatcherConfig {
        image_fallback: ImageFallback::Reject,
        ..MatcherConfig::with_images(0.6)
    };
    let mut matcher = matcher(config, image_text_embedder(), None, image_source());

    let response = matcher.process_match_request(image_request()).await;

    assert_eq!(
        response.results[0].result,
        MatchResult::rejected(ScoreError::ImageFeatureUnavailable)
    );
    assert!(response.selected.is_none());
}

#[tokio::test]
async fn undecodable_images_are_skipped() {
    let source = image_source().with("https://img.example.com/broken.jpg", b"corrupt");
    let mut request = image_request();
    request.candidates[0]
        .image_urls
        .push("//img.example.com/broken.jpg".to_string());
    let mut matcher = matcher(
        MatcherConfig::with_images(0.6),
        image_text_embedder(),
        Some(image_embedder()),
        source,
    );

    let response = matcher.process_match_request(request).await;

    assert!(matches!(response.results[0].result.reason, MatchReason::CombinedScore(_)));
    assert_eq!(response.stats.image_decode_failures, 1);
    assert_eq!(response.stats.image_fetch_failures, 0);
}

#[test]
fn similarity_of_two_texts() {
    let text = FakeTextEmbedder::default()
        .with("운동화", keyword_axis())
        .with("나이키 에어맥스 런닝화", at_similarity(0.6));
    let mut matcher = matcher(MatcherConfig::default(), text, None, FakeImageSource::default());

    let similarity = matcher
        .similarity("나이키 에어맥스 런닝화", "운동화")
        .expect("defined similarity");

    assert!((similarity - 0.6).abs() < 1e-4);
    assert_eq!(matcher.similarity("알 수 없음", "운동화"), None);
}

#[test]
fn benchmark_sweeps_thresholds() {
    let mut text = FakeTextEmbedder::default()
        .with("운동화", keyword_axis())
        .with("나이키 에어맥스 런닝화 남성용", at_similarity(0.62))
        .with("아디다스 스니커즈 화이트", at_similarity(0.48))
        .with("구두 정장화 가죽 남성", at_similarity(0.35));
    let labeled = |title: &str, expected| LabeledPair {
        keyword: "운동화".to_string(),
        title: title.to_string(),
        expected,
    };

    let reports = process_benchmark_message(
        BenchmarkRequest {
            cases: vec![
                labeled("나이키 에어맥스 런닝화 남성용", true),
                labeled("아디다스 스니커즈 화이트", true),
                labeled("구두 정장화 가죽 남성", false),
            ],
            thresholds: vec![],
        },
        &mut text,
    )
    .expect("benchmark runs");

    assert_eq!(reports.len(), 5);
    let correct = reports.iter().map(|r| r.correct).collect::<Vec<_>>();
    assert_eq!(correct, vec![2, 3, 2, 2, 1]);
}

#[test]
fn messages_use_externally_tagged_json() {
    let message: ZMQMessage = serde_json::from_value(serde_json::json!({
        "Match": {
            "keyword": "운동화",
            "candidates": [{
                "url": "https://ssadagu.kr/shop/view.php?num_iid=7",
                "title": "뉴발란스 워킹화"
            }]
        }
    }))
    .expect("valid match message");
    assert!(matches!(message, ZMQMessage::Match(ref request) if request.candidates.len() == 1));

    let similarity: ZMQMessage =
        serde_json::from_str(r#"{"Similarity":["무선이어폰","에어팟 프로"]}"#)
            .expect("valid similarity message");
    assert!(matches!(similarity, ZMQMessage::Similarity(_)));

    let reply = serde_json::to_string(&ZMQReply::Similarity(Some(0.5))).expect("serializable");
    assert_eq!(reply, r#"{"Similarity":0.5}"#);
}
