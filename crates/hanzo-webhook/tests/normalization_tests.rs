#[cfg(test)]
mod tests {

    use base64::{engine::general_purpose::STANDARD, Engine};
    use hanzo_webhook::{
        aggregate, extract, unwrap_text, AssetDecodeError, AssetDecoder, AssetSourceKind,
        GenerationTracker, LatestResult, Platform, ReadyText, WebhookError,
    };
    use serde_json::{json, Value};

    fn current_fixtures() -> Vec<(Platform, Value)> {
        vec![
            (
                Platform::Twitter,
                json!({
                    "single_tweet": {"ready_to_post": "Rust 2024 edition is out #rust"},
                    "hashtag_strategy": {"all_tags_string": "#rust #systems"},
                    "engagement_prediction": {"score": 7.5}
                }),
            ),
            (
                Platform::Linkedin,
                json!({
                    "quick_publish": {"post_ready": "Three hiring lessons from our Series A", "hashtags_ready": "#hiring #startups"},
                    "linkedin_post": {"optimal_time": "Tuesday 9am"}
                }),
            ),
            (
                Platform::Instagram,
                json!({
                    "instagram_post": {"caption_ready": "Golden hour at the pier", "hashtags": ["#sunset", "#pier"]},
                    "visual_strategy": "Warm tones, wide shot"
                }),
            ),
            (
                Platform::Facebook,
                json!({
                    "facebook_post": {"full_post": "Join our community cleanup this weekend"},
                    "hashtag_strategy": {"industry_tags": ["community", "volunteer"]}
                }),
            ),
        ]
    }

    #[test]
    fn test_array_wrapping_yields_identical_records() {
        for (platform, payload) in current_fixtures() {
            let flat = extract(&payload, platform);
            let wrapped = extract(&json!([{"json": payload.clone()}]), platform);
            let bare_array = extract(&json!([payload.clone()]), platform);
            assert_eq!(
                serde_json::to_vec(&flat).unwrap(),
                serde_json::to_vec(&wrapped).unwrap(),
                "{} wrapped",
                platform
            );
            assert_eq!(flat, bare_array, "{} bare array", platform);
            assert!(!flat.ready_to_post_text.is_generating(), "{}", platform);
        }
    }

    #[test]
    fn test_fenced_and_unfenced_parse_identically() {
        let body = r#"{"linkedin_post": {"content": "Fenced or not, same post"}}"#;
        let fenced = format!("```json\n{}\n```", body);
        assert_eq!(unwrap_text(&fenced).value, unwrap_text(body).value);
    }

    #[test]
    fn test_malformed_json_degrades_without_panicking() {
        for input in ["{", "[{\"json\": ", "```json\n{oops}\n```", "<html>502 Bad Gateway</html>"] {
            let payload = unwrap_text(input);
            assert!(payload.parse_failed, "{}", input);
            assert_eq!(payload.value["parseFailed"], json!(true));
        }
    }

    #[test]
    fn test_degraded_payload_still_feeds_extraction() {
        let payload = unwrap_text("Here is your post: Rust makes systems fun again");
        let record = extract(&payload.value, Platform::Linkedin);
        assert_eq!(
            record.ready_to_post_text.as_content(),
            Some("Here is your post: Rust makes systems fun again")
        );
    }

    #[test]
    fn test_missing_text_yields_generating_sentinel() {
        let record = extract(&json!({"hashtag_strategy": {"all_tags_string": "#only #tags"}}), Platform::Instagram);
        assert_eq!(record.ready_to_post_text, ReadyText::Generating);
        assert!(!record.extraction_trace.is_empty());
        assert_eq!(record.hashtags, vec!["#only", "#tags"]);
        let as_json = serde_json::to_value(&record).unwrap();
        assert_eq!(as_json["readyToPostText"], json!({"kind": "generating"}));
    }

    #[test]
    fn test_twitter_quick_publish_scenario() {
        let payload = json!({
            "quick_publish": {"single_tweet_ready": "Hello #ai"},
            "hashtag_strategy": {"all_tags_string": "#ai #ml"}
        });
        let record = extract(&payload, Platform::Twitter);
        assert_eq!(record.ready_to_post_text, ReadyText::Content("Hello #ai".to_string()));
        assert_eq!(record.hashtags, vec!["#ai".to_string(), "#ml".to_string()]);
    }

    #[test]
    fn test_facebook_generic_content_scenario() {
        let payload = json!([{"json": {"content": "fallback text"}}]);
        let record = extract(&payload, Platform::Facebook);
        assert_eq!(record.ready_to_post_text, ReadyText::Content("fallback text".to_string()));
        assert_eq!(record.matched_text_path(), Some("content"));
    }

    #[test]
    fn test_data_uri_round_trip_keeps_declared_mime() {
        let bytes = b"\xFF\xD8\xFF\xE0 jpeg body".to_vec();
        let uri = format!("data:image/jpeg;base64,{}", STANDARD.encode(&bytes));
        let decoder = AssetDecoder::default();
        let record = decoder
            .decode_payload(&json!({"data": {"data": uri, "mimeType": "image/jpeg"}}))
            .unwrap();
        assert_eq!(record.source_kind, AssetSourceKind::DataUri);
        assert_eq!(record.mime_type, "image/jpeg");
        let handle = record.local_handle.clone().unwrap();
        assert_eq!(handle.bytes().unwrap().as_slice(), bytes.as_slice());
    }

    #[test]
    fn test_corrupt_base64_is_asset_decode_error() {
        let decoder = AssetDecoder::default();
        let err = decoder
            .decode_payload(&json!({"data": {"data": "data:image/png;base64,abc"}}))
            .unwrap_err();
        assert!(matches!(
            err,
            WebhookError::AssetDecode(AssetDecodeError::InvalidBase64(_))
        ));
    }

    #[test]
    fn test_aggregate_without_envelope_returns_none() {
        assert!(aggregate(&json!({"success": true, "message": "Batch queued"})).is_none());
        assert!(aggregate(&json!([{"json": {"status": "done"}}])).is_none());
    }

    #[test]
    fn test_stale_generation_is_discarded() {
        let latest = LatestResult::new(GenerationTracker::new());
        let token_1 = latest.tracker().begin();
        let token_2 = latest.tracker().begin();

        assert!(latest.commit(token_2, extract(&json!({"content": "newer result"}), Platform::Twitter)));
        assert!(!latest.commit(token_1, extract(&json!({"content": "older result"}), Platform::Twitter)));

        let state = latest.get().unwrap();
        assert_eq!(state.ready_to_post_text.as_content(), Some("newer result"));
        assert_eq!(latest.committed_token(), Some(token_2));
    }
}
