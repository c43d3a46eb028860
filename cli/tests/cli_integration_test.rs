use std::fs;
use std::path::PathBuf;
use std::process::Command;

fn tmp_path(name: &str) -> PathBuf {
    let tmp_dir = std::env::temp_dir().join("ultrasonic-cli-tests");
    fs::create_dir_all(&tmp_dir).ok();
    tmp_dir.join(name)
}

fn run_ultrasonic(args: &[&str]) -> (bool, String) {
    let output = Command::new(env!("CARGO_BIN_EXE_ultrasonic"))
        .args(args)
        .output()
        .expect("Failed to execute ultrasonic");

    let text = String::from_utf8_lossy(&output.stderr).to_string()
        + &String::from_utf8_lossy(&output.stdout);
    (output.status.success(), text)
}

#[test]
fn test_encode_creates_wav() {
    let output = tmp_path("test_encode.wav");

    let (ok, text) = run_ultrasonic(&["encode", "Test message", "-o", output.to_str().unwrap()]);
    assert!(ok, "encode failed: {}", text);
    assert!(text.contains("Encoded"), "Unexpected output: {}", text);

    // 44-byte header + (4 + 320) frames of 512 samples at 2 bytes each
    let metadata = fs::metadata(&output).expect("Output file not created");
    assert_eq!(metadata.len(), 44 + 2 * 324 * 512);
}

#[test]
fn test_encode_decode_round_trip() {
    let encoded = tmp_path("test_round_trip.wav");
    let decoded = tmp_path("test_round_trip.bin");

    let (ok, text) = run_ultrasonic(&["encode", "Offline payment", "-o", encoded.to_str().unwrap()]);
    assert!(ok, "encode failed: {}", text);

    let (ok, text) = run_ultrasonic(&[
        "decode",
        encoded.to_str().unwrap(),
        "-o",
        decoded.to_str().unwrap(),
    ]);
    assert!(ok, "decode failed: {}", text);
    assert_eq!(fs::read(&decoded).unwrap(), b"Offline payment");
}

#[test]
fn test_encode_from_input_file() {
    let input = tmp_path("test_input.txt");
    let encoded = tmp_path("test_input.wav");
    fs::write(&input, "from a file").unwrap();

    let (ok, text) = run_ultrasonic(&[
        "encode",
        "--input",
        input.to_str().unwrap(),
        "-o",
        encoded.to_str().unwrap(),
    ]);
    assert!(ok, "encode failed: {}", text);

    let (ok, text) = run_ultrasonic(&["decode", encoded.to_str().unwrap()]);
    assert!(ok, "decode failed: {}", text);
    assert!(text.contains("from a file"), "Unexpected output: {}", text);
}

#[test]
fn test_encode_rejects_message_and_input() {
    let input = tmp_path("test_both.txt");
    fs::write(&input, "x").unwrap();
    let output = tmp_path("test_both.wav");

    let (ok, _) = run_ultrasonic(&[
        "encode",
        "text",
        "--input",
        input.to_str().unwrap(),
        "-o",
        output.to_str().unwrap(),
    ]);
    assert!(!ok);
}

#[test]
fn test_decode_raw_bits() {
    let encoded = tmp_path("test_raw_bits.wav");
    run_ultrasonic(&["encode", "Hi", "-o", encoded.to_str().unwrap()]);

    let (ok, text) = run_ultrasonic(&["decode", encoded.to_str().unwrap(), "--raw-bits"]);
    assert!(ok, "decode failed: {}", text);
    // Four silent-padded preamble frames, then the bits of "Hi"
    assert!(text.contains("0100100001101001"), "Unexpected output: {}", text);
}

#[test]
fn test_check_reports_in_band() {
    let encoded = tmp_path("test_check.wav");
    run_ultrasonic(&["encode", "check me", "-o", encoded.to_str().unwrap()]);

    let (ok, text) = run_ultrasonic(&["check", encoded.to_str().unwrap()]);
    assert!(ok, "check failed: {}", text);
    assert!(text.contains("Dominant frequency"), "Unexpected output: {}", text);
    assert!(text.contains("in band"), "Unexpected output: {}", text);
    assert!(!text.contains("out of band"), "Unexpected output: {}", text);
}

#[test]
fn test_config_file_changes_tones() {
    let config = tmp_path("test_config.json");
    let encoded = tmp_path("test_config.wav");
    fs::write(&config, r#"{ "f0": 18000.0, "df": 1500.0 }"#).unwrap();

    let (ok, text) = run_ultrasonic(&[
        "--config",
        config.to_str().unwrap(),
        "encode",
        "moved",
        "-o",
        encoded.to_str().unwrap(),
    ]);
    assert!(ok, "encode failed: {}", text);

    let (ok, text) = run_ultrasonic(&["--config", config.to_str().unwrap(), "decode", encoded.to_str().unwrap()]);
    assert!(ok, "decode failed: {}", text);
    assert!(text.contains("moved"), "Unexpected output: {}", text);

    // Default tones no longer cover the signal
    let (ok, text) = run_ultrasonic(&["check", encoded.to_str().unwrap()]);
    assert!(ok, "check failed: {}", text);
    assert!(text.contains("out of band"), "Unexpected output: {}", text);
}

#[test]
fn test_decode_missing_file_fails() {
    let (ok, _) = run_ultrasonic(&["decode", tmp_path("does_not_exist.wav").to_str().unwrap()]);
    assert!(!ok);
}
