#![cfg(feature = "clap")]

use std::process::Command;

#[test]
fn cli_writes_pdf_and_prints_summary() {
    let dir = tempfile::tempdir().unwrap();

    let records: Vec<_> = (0..9)
        .map(|i| {
            serde_json::json!({
                "identifier": format!("M-{i:03}"),
                "givenNames": "Ana",
                "familyNames": "Silva",
                "category": "Senior",
                "issueDate": "2026-03-01",
            })
        })
        .collect();
    let records_path = dir.path().join("records.json");
    std::fs::write(&records_path, serde_json::to_string(&records).unwrap()).unwrap();

    let palette_path = dir.path().join("palette.json");
    std::fs::write(
        &palette_path,
        r##"{"primary": "#0047A0", "secondary": "#CD2E3A", "accent": "#FFFFFF"}"##,
    )
    .unwrap();

    let settings_path = dir.path().join("settings.json");
    std::fs::write(
        &settings_path,
        r#"{"settleDelayMs": 0, "oversampling": 2.0, "loadSystemFonts": false}"#,
    )
    .unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_cardpress"))
        .arg("--records")
        .arg(&records_path)
        .arg("--palette")
        .arg(&palette_path)
        .arg("--settings")
        .arg(&settings_path)
        .arg("--output")
        .arg(dir.path())
        .args(["--name", "badges", "--organization", "Lions Club"])
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let summary: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(summary["pageCount"], 2);
    assert_eq!(summary["format"], "letter");
    assert_eq!(summary["rendered"].as_array().unwrap().len(), 9);

    let pdf = std::fs::read(dir.path().join("badges.pdf")).unwrap();
    assert!(pdf.starts_with(b"%PDF"));
}

#[test]
fn cli_fails_on_missing_records_file() {
    let dir = tempfile::tempdir().unwrap();
    let output = Command::new(env!("CARGO_BIN_EXE_cardpress"))
        .args(["--records", "/nonexistent/records.json", "--palette", "p.json", "--name", "x"])
        .arg("--output")
        .arg(dir.path())
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("records"));
    assert!(!dir.path().join("x.pdf").exists());
}
