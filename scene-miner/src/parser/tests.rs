//! # Parser 测试
//!
//! 覆盖策略选择、结构化遍历、窗口回退与多语言抽取。

use super::*;
use crate::config::{FallbackConfig, SpanPick};
use crate::diagnostic::DiagnosticLevel;
use crate::text::WorkingLanguage;

fn parser() -> SceneParser {
    SceneParser::new(ParserConfig::default())
}

fn texts_of(record: &DialogueRecord) -> Vec<&str> {
    record.texts.iter().map(|t| t.text.as_str()).collect()
}

// -------------------------------------------------------------------------
// 策略选择
// -------------------------------------------------------------------------

#[test]
fn test_document_load_variants() {
    assert!(matches!(Document::load(r#"{"a": 1}"#), Document::Structured(_)));
    assert!(matches!(
        Document::load("\u{feff}[1, 2]"),
        Document::Structured(_)
    ));

    match Document::load("{\n  \"a\": [1, 2\n") {
        Document::Fallback(reason) => {
            assert!(reason.line >= 2);
            assert!(!reason.message.is_empty());
        }
        Document::Structured(_) => panic!("unbalanced document must fall back"),
    }
}

#[test]
fn test_structured_document_without_dialogue_reports_zero_records() {
    let parsed = parser().parse_scene("empty.json", r#"{"foo": 1, "bar": [true, null]}"#);
    assert_eq!(parsed.strategy, Strategy::Structured);
    assert!(parsed.records.is_empty());
    assert_eq!(parsed.diagnostics.warn_count(), 1);
    assert!(!parsed.diagnostics.has_errors());
}

#[test]
fn test_bom_prefixed_document_is_structured() {
    let content = "\u{feff}{\"voice\":\"ATR_b101_010\",\"text\":\"はい\"}";
    let parsed = parser().parse_scene("bom.json", content);
    assert_eq!(parsed.strategy, Strategy::Structured);
    assert_eq!(parsed.records.len(), 1);
}

// -------------------------------------------------------------------------
// 结构化遍历
// -------------------------------------------------------------------------

#[test]
fn test_voice_object_pairs_with_working_language_text() {
    let content = r#"{"scenes":[{"name":"ATR","voice":"ATR_b101_001","en":"Yes","text":"「はい、夏生さん」"}]}"#;
    let records = parser().parse(content);

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].voice_id.as_deref(), Some("ATR_b101_001"));
    assert_eq!(records[0].speaker, "ATR");
    assert_eq!(texts_of(&records[0]), vec!["はい、夏生さん"]);
}

#[test]
fn test_speaker_field_is_not_taken_as_text() {
    let content = r#"{"name":"アトリ","voice":"ATR_b101_011","text":"おはよう"}"#;
    let records = parser().parse(content);
    assert_eq!(texts_of(&records[0]), vec!["おはよう"]);
    assert_eq!(records[0].speaker, "アトリ");
}

#[test]
fn test_voice_object_searches_list_children() {
    let content = r#"{"voice":"ATR_b101_012","lines":[1,"Hello","こんばんは"]}"#;
    let records = parser().parse(content);
    assert_eq!(texts_of(&records[0]), vec!["こんばんは"]);
}

#[test]
fn test_dialogue_line_takes_voice_from_trailing_sibling() {
    let content = r#"{"texts":[["ATR",null,[[null,"「おはようございます」"],[null,"Good morning"],[null,"早上好"]],[{"name":"ATR","voice":"ATR_b102_010"}]]]}"#;
    let records = parser().parse(content);

    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.voice_id.as_deref(), Some("ATR_b102_010"));
    assert_eq!(record.speaker, "ATR");
    assert_eq!(
        texts_of(record),
        vec!["おはようございます", "Good morning", "早上好"]
    );
}

#[test]
fn test_dialogue_line_without_voice_is_still_a_record() {
    let content = r#"[["NAT","Natsuki",[[null,"こんにちは"],[null,"Hello"],[null,"你好"]]], ["ATR","Atri",[[null,"はい、夏生さん"],[null,"Yes"],[null,"是的"]]]]"#;
    let records = parser().parse(content);

    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| r.voice_id.is_none()));
    assert_eq!(records[0].speaker, "NAT");
    assert_eq!(records[1].speaker, "ATR");
    assert_eq!(records[1].text_for_slot(2), "是的");
}

#[test]
fn test_dialogue_line_keeps_slot_positions() {
    let content = r#"[["ATR",null,[["ja","はい"],["en"],["zh","是的"]]]]"#;
    let records = parser().parse(content);

    let record = &records[0];
    assert_eq!(record.texts.len(), 3);
    assert_eq!(record.texts[0].tag.as_deref(), Some("ja"));
    assert_eq!(record.texts[1].text, "");
    assert_eq!(record.texts[2].text, "是的");
}

#[test]
fn test_speaker_is_inherited_by_descendants() {
    let content = r#"{"name":"NAT","lines":[{"voice":"NAT_b101_002","text":"行くぞ"}]}"#;
    let records = parser().parse(content);

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].speaker, "NAT");
}

#[test]
fn test_unclaimed_voice_is_inherited_by_dialogue_line() {
    let content = r#"{"voice":"ATR_b101_003","body":[["ATR","アトリ",[[null,"「了解です」"]]]]}"#;
    let records = parser().parse(content);

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].voice_id.as_deref(), Some("ATR_b101_003"));
    assert_eq!(texts_of(&records[0]), vec!["了解です"]);
}

#[test]
fn test_claimed_voice_does_not_leak_to_descendants() {
    let content = r#"{"voice":"ATR_b101_004","text":"はい","next":[["NAT",null,[[null,"うん"]]]]}"#;
    let records = parser().parse(content);

    assert_eq!(records.len(), 2);
    assert_eq!(records[0].voice_id.as_deref(), Some("ATR_b101_004"));
    assert_eq!(records[1].voice_id, None);
    assert_eq!(records[1].speaker, "NAT");
}

#[test]
fn test_own_trailing_voice_wins_over_inherited_voice() {
    let content = r#"{"voice":"ATR_b101_003","body":[["NAT",null,[[null,"うん"]],{"voice":"NAT_b101_004"}],["ATR",null,[[null,"はい"]],{"voice":"ATR_b101_005"}]]}"#;
    let parsed = parser().parse_scene("own.json", content);

    let pairs: Vec<(Option<&str>, &str)> = parsed
        .records
        .iter()
        .map(|r| (r.voice_id.as_deref(), r.speaker.as_str()))
        .collect();
    assert_eq!(
        pairs,
        vec![(Some("NAT_b101_004"), "NAT"), (Some("ATR_b101_005"), "ATR")]
    );

    // 外层语音没有被任何台词认领
    assert_eq!(parsed.unmatched_markers, 1);
    assert!(
        parsed
            .diagnostics
            .diagnostics
            .iter()
            .any(|d| d.detail.as_deref() == Some("ATR_b101_003"))
    );
}

#[test]
fn test_inherited_voice_is_claimed_once() {
    let content = r#"{"voice":"ATR_b101_006","body":[["ATR",null,[[null,"はい"]]],["NAT",null,[[null,"うん"]]]]}"#;
    let parsed = parser().parse_scene("once.json", content);

    assert_eq!(parsed.records.len(), 2);
    assert_eq!(parsed.records[0].voice_id.as_deref(), Some("ATR_b101_006"));
    assert_eq!(parsed.records[1].voice_id, None);
    assert_eq!(parsed.unmatched_markers, 0);
}

#[test]
fn test_nested_voice_does_not_shadow_ancestor_voice() {
    let content = r#"{"voice":"ATR_b101_007","a":{"voice":"NAT_b101_008","b":[["NAT",null,[[null,"うん"]]]]},"c":[["ATR",null,[[null,"はい"]]]]}"#;
    let records = parser().parse(content);

    assert_eq!(records.len(), 2);
    assert_eq!(records[0].voice_id.as_deref(), Some("NAT_b101_008"));
    assert_eq!(records[1].voice_id.as_deref(), Some("ATR_b101_007"));
    assert_eq!(records[1].speaker, "ATR");
}

#[test]
fn test_structured_voice_without_text_is_unmatched() {
    let content = r#"{"a":[{"voice":"ATR_b101_001","text":"Hello"},{"voice":"ATR_b101_002","text":"はい"}]}"#;
    let parsed = parser().parse_scene("plain.json", content);

    assert_eq!(parsed.strategy, Strategy::Structured);
    assert_eq!(parsed.records.len(), 1);
    assert_eq!(parsed.records[0].voice_id.as_deref(), Some("ATR_b101_002"));
    assert_eq!(parsed.unmatched_markers, 1);
    assert_eq!(parsed.diagnostics.warn_count(), 1);
    assert_eq!(
        parsed.diagnostics.diagnostics[0].detail.as_deref(),
        Some("ATR_b101_001")
    );
}

#[test]
fn test_trailing_voice_on_empty_line_is_unmatched() {
    let content = r#"[["ATR",null,[[null,""],[null,"「」"]],{"voice":"ATR_b101_009"}]]"#;
    let parsed = parser().parse_scene("blank.json", content);

    assert!(parsed.records.is_empty());
    assert_eq!(parsed.unmatched_markers, 1);
}

#[test]
fn test_sibling_context_is_isolated() {
    let content = r#"[{"name":"NAT","a":{"voice":"NAT_b1_1","t":"ねえ"}},{"b":{"voice":"ATR_b1_2","t":"はい"}}]"#;
    let records = parser().parse(content);

    assert_eq!(records.len(), 2);
    assert_eq!(records[0].speaker, "NAT");
    assert_eq!(records[1].speaker, "");
}

#[test]
fn test_custom_keys_and_language() {
    let config = ParserConfig {
        voice_key: "vo".to_string(),
        speaker_key: "who".to_string(),
        working_language: WorkingLanguage::Chinese,
        ..ParserConfig::default()
    };
    let content = r#"{"who":"ATR","vo":"ATR_b101_013","ja":"はい","zh":"是的"}"#;
    let records = SceneParser::new(config).parse(content);

    assert_eq!(records[0].speaker, "ATR");
    assert_eq!(texts_of(&records[0]), vec!["是的"]);
}

// -------------------------------------------------------------------------
// 窗口回退
// -------------------------------------------------------------------------

#[test]
fn test_fallback_recovers_voice_text_pair() {
    let content = r#"{"scenes": [ {"texts": [["ATR", "アトリ", [[null, "「今日はいい天気ですね」"]]], "voice": "ATR_b101_005" "#;
    let parsed = parser().parse_scene("broken.json", content);

    assert_eq!(parsed.strategy, Strategy::Windowed);
    assert_eq!(parsed.records.len(), 1);
    let record = &parsed.records[0];
    assert_eq!(record.voice_id.as_deref(), Some("ATR_b101_005"));
    assert_eq!(record.speaker, "ATR");
    assert_eq!(texts_of(record), vec!["今日はいい天気ですね"]);

    // 回退本身只是提示
    assert_eq!(parsed.diagnostics.filter_by_level(DiagnosticLevel::Info).len(), 1);
    assert_eq!(parsed.diagnostics.warn_count(), 0);
}

#[test]
fn test_fallback_marker_without_text_is_unmatched() {
    let content = r#"{"voice": "ATR_b101_006", "text": "Hello" "#;
    let parsed = parser().parse_scene("broken.json", content);

    assert!(parsed.records.is_empty());
    assert_eq!(parsed.unmatched_markers, 1);
    // 一条标记未匹配 + 一条零记录
    assert_eq!(parsed.diagnostics.warn_count(), 2);
    assert!(
        parsed
            .diagnostics
            .diagnostics
            .iter()
            .any(|d| d.detail.as_deref() == Some("ATR_b101_006") && d.line == Some(1))
    );
}

#[test]
fn test_fallback_accepts_voice_suffix_letter() {
    let content = r#"[["ATR", "アトリ", "「えへへ」", "ATR_b103_020a""#;
    let records = parser().parse(content);
    assert_eq!(records[0].voice_id.as_deref(), Some("ATR_b103_020a"));
}

#[test]
fn test_fallback_marker_key_ignores_other_fields() {
    let content = r#"[{"voice": "ATR_b101_020", "text": "「はい」", "storage": "ATR_b101_020"}, {"label": "NAT_b101_021", "#;

    let loose = extract_windowed(content, &FallbackConfig::default(), &WorkingLanguage::Japanese);
    assert_eq!(loose.records.len() + loose.unmatched.len(), 3);

    let keyed = FallbackConfig {
        marker_key: Some("voice".to_string()),
        ..FallbackConfig::default()
    };
    let strict = extract_windowed(content, &keyed, &WorkingLanguage::Japanese);
    assert_eq!(strict.records.len(), 1);
    assert!(strict.unmatched.is_empty());
    assert_eq!(strict.records[0].voice_id.as_deref(), Some("ATR_b101_020"));
    assert_eq!(strict.records[0].texts[0].text, "はい");
}

#[test]
fn test_fallback_span_pick_policies() {
    let content = r#"{"a": "「前のセリフ」", "voice": "ATR_b101_007", "b": "「後のセリフ」""#;
    let language = WorkingLanguage::Japanese;

    let last = extract_windowed(content, &FallbackConfig::default(), &language);
    assert_eq!(last.records[0].texts[0].text, "後のセリフ");

    let nearest = FallbackConfig {
        pick: SpanPick::NearestBefore,
        ..FallbackConfig::default()
    };
    let before = extract_windowed(content, &nearest, &language);
    assert_eq!(before.records[0].texts[0].text, "前のセリフ");
}

#[test]
fn test_fallback_without_corner_bracket_preference() {
    let content = r#"{"a": "「括弧付き」", "b": "地の文です", "voice": "ATR_b101_008""#;
    let language = WorkingLanguage::Japanese;

    let preferred = extract_windowed(content, &FallbackConfig::default(), &language);
    assert_eq!(preferred.records[0].texts[0].text, "括弧付き");

    let plain = FallbackConfig {
        prefer_corner_brackets: false,
        ..FallbackConfig::default()
    };
    let result = extract_windowed(content, &plain, &language);
    assert_eq!(result.records[0].texts[0].text, "地の文です");
}

#[test]
fn test_fallback_window_bounds() {
    let content = format!(
        r#"{{"a": "「遠いセリフ」"{}"voice": "ATR_b101_009""#,
        " ".repeat(3000)
    );
    let language = WorkingLanguage::Japanese;

    let narrow = extract_windowed(&content, &FallbackConfig::default(), &language);
    assert!(narrow.records.is_empty());
    assert_eq!(narrow.unmatched.len(), 1);

    let wide = FallbackConfig {
        window_before: 4000,
        ..FallbackConfig::default()
    };
    let result = extract_windowed(&content, &wide, &language);
    assert_eq!(result.records[0].texts[0].text, "遠いセリフ");
}

#[test]
fn test_fallback_reports_marker_lines() {
    let content = "{\n\"voice\": \"ATR_b101_014\",\n\n\"voice\": \"ATR_b101_015\"";
    let extraction = extract_windowed(content, &FallbackConfig::default(), &WorkingLanguage::Japanese);
    let lines: Vec<usize> = extraction.unmatched.iter().map(|m| m.line).collect();
    assert_eq!(lines, vec![2, 4]);
}

// -------------------------------------------------------------------------
// 多语言抽取
// -------------------------------------------------------------------------

const SCENARIO: &str = r#"[["NAT","Natsuki",[[null,"こんにちは"],[null,"Hello"],[null,"你好"]]], ["ATR","Atri",[[null,"はい、夏生さん"],[null,"Yes"],[null,"是的"]]]]"#;

#[test]
fn test_parallel_extracts_all_slots() {
    let lines = ParallelExtractor::new(3).extract(SCENARIO);

    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0].speaker, "NAT");
    let texts: Vec<&str> = lines[1].texts.iter().map(|t| t.text.as_str()).collect();
    assert_eq!(texts, vec!["はい、夏生さん", "Yes", "是的"]);
    assert!(lines[1].texts.iter().all(|t| t.tag.is_none()));
}

#[test]
fn test_parallel_accepts_empty_speaker() {
    let content = r#"[["", null, [[null, "地の文"], [null, "narr"], [null, "旁白"]]]]"#;
    let lines = ParallelExtractor::new(3).extract(content);

    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].speaker, "");
    assert_eq!(conversation_lines(&lines, 2), vec![(String::new(), "旁白".to_string())]);
}

#[test]
fn test_parallel_target_slot_lines() {
    let lines = ParallelExtractor::new(3).extract(SCENARIO);
    assert_eq!(
        conversation_lines(&lines, 2),
        vec![
            ("NAT".to_string(), "你好".to_string()),
            ("ATR".to_string(), "是的".to_string()),
        ]
    );
}

#[test]
fn test_parallel_matches_across_line_breaks() {
    let content = "[\"ATR\", null, [\n  [null, \"「はい」\"],\r\n  [null, \"Yes\"],\n  [null, \"是的\"]\n]]";
    let lines = ParallelExtractor::new(3).extract(content);
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].texts[0].text, "はい");
}

#[test]
fn test_parallel_tolerates_escapes_and_control_characters() {
    let content = "[\"ATR\", null, [[\"ja\", \"彼は\\\"はい\\\"と言った\"], [\"en\", \"tab\there\"], [\"zh\", \"他说\\\"是\\\"了\"]]]";
    let lines = ParallelExtractor::new(3).extract(content);

    assert_eq!(lines.len(), 1);
    let line = &lines[0];
    assert_eq!(line.texts[0].tag.as_deref(), Some("ja"));
    assert_eq!(line.texts[0].text, "彼は\"はい\"と言った");
    assert_eq!(line.texts[1].text, "tab\there");
    assert_eq!(line.texts[2].text, "他说\"是\"了");
}

#[test]
fn test_parallel_empty_target_slot_drops_line() {
    let content = r#"[["ATR", null, [[null, "はい"], [null, "Yes"], [null, ""]]], ["NAT", null, [[null, "うん"], [null, "Yeah"], [null, "%fuser;"]]]]"#;
    let lines = ParallelExtractor::new(3).extract(content);

    assert_eq!(lines.len(), 2);
    assert!(conversation_lines(&lines, 2).is_empty());
    // 原文槽位仍然可用
    assert_eq!(conversation_lines(&lines, 0).len(), 2);
}

#[test]
fn test_parallel_requires_configured_arity() {
    let content = r#"["ATR", null, [[null, "はい"]]]"#;
    assert!(ParallelExtractor::new(3).extract(content).is_empty());
    assert_eq!(ParallelExtractor::new(1).extract(content).len(), 1);
}

#[test]
fn test_parallel_works_on_malformed_document() {
    let content = format!("{{ broken {SCENARIO}");
    assert!(matches!(Document::load(&content), Document::Fallback(_)));
    assert_eq!(ParallelExtractor::new(3).extract(&content).len(), 2);
}
