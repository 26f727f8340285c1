use super::*;

/// Build a nestest-style reference line with the mnemonic in its fixed column.
fn ref_line(pc: &str, mnemonic: &str) -> String {
    format!("{pc:<16}{mnemonic} $00                         A:00 X:00 Y:00 P:24 SP:FD")
}

fn reference(entries: &[(&str, &str)]) -> Vec<String> {
    entries.iter().map(|(pc, m)| ref_line(pc, m)).collect()
}

#[test]
fn test_parse_reference_line() {
    let line = ReferenceLine::parse(0, "C000  4C F5 C5  JMP $C5F5                       A:00 X:00 Y:00 P:24 SP:FD")
        .unwrap();
    assert_eq!(line.pc(), "C000");
    assert_eq!(line.mnemonic(), "JMP");
    assert!(line.raw().starts_with("C000  4C"));
}

#[test]
fn test_parse_reference_line_exact_width() {
    let line = ReferenceLine::parse(3, "C5F5            LDX").unwrap();
    assert_eq!(line.pc(), "C5F5");
    assert_eq!(line.mnemonic(), "LDX");
}

#[test]
fn test_parse_reference_line_too_short() {
    let err = ReferenceLine::parse(7, "C000  4C F5").unwrap_err();
    assert!(matches!(
        err,
        TraceError::MalformedTraceLine {
            line_index: 7,
            log: TraceSource::Reference,
            ..
        }
    ));
    assert_eq!(err.line_index(), Some(7));
}

#[test]
fn test_parse_reference_line_split_char() {
    // 'é' occupies bytes 3..5, so the pc field 0..4 cannot be sliced out.
    let err = ReferenceLine::parse(0, "C00é            LDA").unwrap_err();
    assert_eq!(err.line_index(), Some(0));
}

#[test]
fn test_parse_candidate_line() {
    let line = CandidateLine::parse(0, "  c5f5 \r").unwrap();
    assert_eq!(line.pc(), "C5F5");
    assert_eq!(line.raw(), "  c5f5 \r");
}

#[test]
fn test_parse_candidate_line_blank() {
    let err = CandidateLine::parse(4, "   ").unwrap_err();
    assert!(matches!(
        err,
        TraceError::MalformedTraceLine {
            line_index: 4,
            log: TraceSource::Candidate,
            ..
        }
    ));
}

#[test]
fn test_pad_pc() {
    assert_eq!(pad_pc("1"), "0001");
    assert_eq!(pad_pc("C5"), "00C5");
    assert_eq!(pad_pc("C5F5"), "C5F5");
    // Never truncates.
    assert_eq!(pad_pc("1C5F5"), "1C5F5");
    // Padding twice changes nothing.
    assert_eq!(pad_pc(&pad_pc("1")), "0001");
}

#[test]
fn test_empty_logs_rejected() {
    let err = ReferenceLog::parse(Vec::<String>::new()).unwrap_err();
    assert!(matches!(err, TraceError::EmptyTrace(TraceSource::Reference)));

    let err = CandidateLog::parse(Vec::<String>::new()).unwrap_err();
    assert!(matches!(err, TraceError::EmptyTrace(TraceSource::Candidate)));
}

#[test]
fn test_malformed_line_index_is_first_bad_line() {
    let mut lines = reference(&[("0000", "LDA"), ("0002", "STA")]);
    lines.push("0005".to_string());
    lines.push("x".to_string());

    let err = ReferenceLog::parse(&lines).unwrap_err();
    assert_eq!(err.line_index(), Some(2));
}

#[test]
fn test_compare_identical() {
    let reference = reference(&[("0000", "LDA"), ("0002", "STA"), ("0005", "BRK")]);
    let candidate = ["0000", "0002", "0005"];

    let result = compare_lines(&reference, &candidate, &CompareConfig::default()).unwrap();
    assert!(result.is_match());
    assert!(result.divergence.is_none());
    assert_eq!(result.compared, 3);
}

#[test]
fn test_compare_end_to_end_example() {
    let reference = reference(&[("0000", "LDA"), ("0002", "STA"), ("0005", "BRK")]);
    let candidate = ["0000", "0002", "0099"];

    let result = compare_lines(&reference, &candidate, &CompareConfig::default()).unwrap();
    let div = result.divergence.unwrap();
    assert_eq!(div.index, 2);
    assert_eq!(div.expected_pc, "0005");
    assert_eq!(div.actual_pc, "0099");
    assert_eq!(div.suspect_opcode, SuspectOpcode::Mnemonic("STA".to_string()));
    assert_eq!(div.previous_reference_line.as_deref(), Some(reference[1].as_str()));
    assert_eq!(div.reference_line, reference[2]);
    assert_eq!(div.candidate_line, "0099");
    assert_eq!(
        div.to_string(),
        "divergence at #2: expected PC 0005, logged 0099 (suspect opcode STA)"
    );
}

#[test]
fn test_compare_divergence_at_zero() {
    let reference = reference(&[("C000", "JMP"), ("C5F5", "LDX")]);
    let candidate = ["0000", "C5F5"];

    let result = compare_lines(&reference, &candidate, &CompareConfig::default()).unwrap();
    let div = result.divergence.unwrap();
    assert_eq!(div.index, 0);
    assert_eq!(div.suspect_opcode, SuspectOpcode::NoPriorInstruction);
    assert_eq!(div.suspect_opcode.mnemonic(), None);
    assert!(div.previous_reference_line.is_none());
    assert!(div.to_string().contains("<no prior instruction>"));
}

#[test]
fn test_compare_first_divergence_wins() {
    let reference = reference(&[
        ("0000", "LDA"),
        ("0002", "STA"),
        ("0005", "INX"),
        ("0006", "BNE"),
    ]);
    let candidate = ["0000", "0002", "0004", "0007"];

    let result = compare_lines(&reference, &candidate, &CompareConfig::default()).unwrap();
    let div = result.divergence.unwrap();
    assert_eq!(div.index, 2);
    assert_eq!(div.suspect_opcode.mnemonic(), Some("STA"));
    assert_eq!(result.compared, 3);
}

#[test]
fn test_compare_padding_and_case() {
    let reference = reference(&[("0001", "NOP"), ("00C5", "NOP")]);
    let candidate = ["1", " c5\n"];

    let result = compare_lines(&reference, &candidate, &CompareConfig::default()).unwrap();
    assert!(result.is_match());
}

#[test]
fn test_compare_candidate_shorter_truncates() {
    let reference = reference(&[("0000", "LDA"), ("0002", "STA"), ("0005", "BRK")]);
    let candidate = ["0000", "0002"];

    let result = compare_lines(&reference, &candidate, &CompareConfig::default()).unwrap();
    assert!(result.is_match());
    assert_eq!(result.compared, 2);
    assert!(result.length_mismatch.is_none());
}

#[test]
fn test_compare_candidate_longer_truncates() {
    let reference = reference(&[("0000", "LDA"), ("0002", "STA")]);
    let candidate = ["0000", "0002", "0005", "0006"];

    let result = compare_lines(&reference, &candidate, &CompareConfig::default()).unwrap();
    assert!(result.is_match());
    assert_eq!(result.compared, 2);
}

#[test]
fn test_compare_strict_length_policy() {
    let reference = reference(&[("0000", "LDA"), ("0002", "STA"), ("0005", "BRK")]);
    let candidate = ["0000", "0002"];
    let config = CompareConfig::default().with_length_policy(LengthPolicy::Strict);

    let result = compare_lines(&reference, &candidate, &config).unwrap();
    assert!(!result.is_match());
    assert!(result.divergence.is_none());
    assert_eq!(
        result.length_mismatch,
        Some(LengthMismatch {
            reference_len: 3,
            candidate_len: 2,
        })
    );
}

#[test]
fn test_compare_strict_policy_prefers_divergence() {
    let reference = reference(&[("0000", "LDA"), ("0002", "STA"), ("0005", "BRK")]);
    let candidate = ["0000", "0003"];
    let config = CompareConfig::default().with_length_policy(LengthPolicy::Strict);

    let result = compare_lines(&reference, &candidate, &config).unwrap();
    assert_eq!(result.divergence.unwrap().index, 1);
    assert!(result.length_mismatch.is_none());
}

#[test]
fn test_parallel_search_matches_serial() {
    let len = 5_000;
    let reference: Vec<String> = (0..len)
        .map(|i| ref_line(&format!("{:04X}", i % 0x1_0000), if i % 2 == 0 { "LDA" } else { "STA" }))
        .collect();
    let mut candidate: Vec<String> = (0..len).map(|i| format!("{:X}", i % 0x1_0000)).collect();
    // Two divergences; the lower one must be reported.
    candidate[3_001] = "FFFF".to_string();
    candidate[4_500] = "FFFF".to_string();

    let serial = CompareConfig::default().serial();
    let parallel = CompareConfig::default().with_parallel_threshold(1);

    let a = compare_lines(&reference, &candidate, &serial).unwrap();
    let b = compare_lines(&reference, &candidate, &parallel).unwrap();
    assert_eq!(a, b);

    let div = b.divergence.unwrap();
    assert_eq!(div.index, 3_001);
    assert_eq!(div.suspect_opcode.mnemonic(), Some("LDA"));
}

#[test]
fn test_load_from_files() {
    use std::io::Write;

    let dir = tempfile::tempdir().unwrap();
    let ref_path = dir.path().join("nestest.log");
    let emu_path = dir.path().join("emu.log");

    let mut f = std::fs::File::create(&ref_path).unwrap();
    for line in reference(&[("C000", "JMP"), ("C5F5", "LDX"), ("C5F7", "STX")]) {
        writeln!(f, "{line}").unwrap();
    }
    std::fs::write(&emu_path, "c000\nc5f5\nc5f8\n").unwrap();

    let reference = ReferenceLog::load(&ref_path).unwrap();
    let candidate = CandidateLog::load(&emu_path).unwrap();
    assert_eq!(reference.len(), 3);
    assert_eq!(candidate.len(), 3);

    let result = compare_traces(&reference, &candidate, &CompareConfig::default());
    let div = result.divergence.unwrap();
    assert_eq!(div.index, 2);
    assert_eq!(div.expected_pc, "C5F7");
    assert_eq!(div.actual_pc, "C5F8");
    assert_eq!(div.suspect_opcode.mnemonic(), Some("LDX"));
}

#[test]
fn test_load_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let err = CandidateLog::load(&dir.path().join("missing.log")).unwrap_err();
    assert!(matches!(
        err,
        TraceError::Io {
            log: TraceSource::Candidate,
            ..
        }
    ));
}

#[test]
fn test_load_reports_non_utf8_line_index() {
    let dir = tempfile::tempdir().unwrap();
    let emu_path = dir.path().join("emu.log");
    std::fs::write(&emu_path, b"c000\r\nc5f5\n\xff\xfe\nc5f8\n").unwrap();

    let err = CandidateLog::load(&emu_path).unwrap_err();
    assert!(matches!(
        err,
        TraceError::MalformedTraceLine {
            line_index: 2,
            log: TraceSource::Candidate,
            ..
        }
    ));
}

#[test]
fn test_load_strips_crlf() {
    let dir = tempfile::tempdir().unwrap();
    let emu_path = dir.path().join("emu.log");
    std::fs::write(&emu_path, "c000\r\nc5f5").unwrap();

    let candidate = CandidateLog::load(&emu_path).unwrap();
    assert_eq!(candidate.len(), 2);
    assert_eq!(candidate[0].raw(), "c000");
    assert_eq!(candidate[1].pc(), "C5F5");
}
