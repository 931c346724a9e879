use std::env;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Output, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

fn bin_path() -> PathBuf {
    if let Some(path) = env::var_os("CARGO_BIN_EXE_forumcode-cli") {
        return PathBuf::from(path);
    }
    let exe = env::current_exe().expect("current exe");
    let mut debug_dir = exe.as_path();
    while let Some(parent) = debug_dir.parent() {
        if parent.file_name().and_then(|name| name.to_str()) == Some("debug") {
            let candidate = parent.join("forumcode-cli");
            if candidate.exists() {
                return candidate;
            }
        }
        debug_dir = parent;
    }
    panic!("binary path missing");
}

fn temp_file(name: &str, extension: &str, contents: &str) -> PathBuf {
    let mut path = env::temp_dir();
    let now = SystemTime::now().duration_since(UNIX_EPOCH).expect("time");
    path.push(format!(
        "forumcode_cli_{}_{}_{}.{}",
        name,
        now.as_secs(),
        now.subsec_nanos(),
        extension
    ));
    fs::write(&path, contents).expect("write temp file");
    path
}

fn run(args: &[&str]) -> Output {
    Command::new(bin_path())
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("run")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn render_prints_fragment() {
    let input = temp_file("render", "fc", "[b]Crap[/b] de [u]12kg[/u]");
    let output = run(&["render", input.to_str().expect("path")]);

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert_eq!(stdout(&output), "<strong>Crap</strong> de <u>12kg</u>");
}

#[test]
fn render_reads_stdin() {
    let mut child = Command::new(bin_path())
        .arg("render")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .spawn()
        .expect("spawn");
    child
        .stdin
        .take()
        .expect("stdin")
        .write_all(b"a < b")
        .expect("write stdin");
    let output = child.wait_with_output().expect("wait");

    assert!(output.status.success());
    assert_eq!(stdout(&output), "a &lt; b");
}

#[test]
fn diagnostics_json_reports_warning_with_success_exit() {
    let input = temp_file("unclosed", "fc", "[b]bold");
    let output = run(&[
        "render",
        "--diagnostics",
        "json",
        input.to_str().expect("path"),
    ]);

    assert!(output.status.success(), "warnings keep a zero exit code");
    assert!(
        stderr(&output).contains("\"code\": \"W_TAG_UNCLOSED\""),
        "expected W_TAG_UNCLOSED in stderr: {}",
        stderr(&output)
    );
    assert_eq!(stdout(&output), "[b]bold");
}

#[test]
fn validate_reports_errors_with_failing_exit() {
    let input = temp_file("unbalanced", "fc", "[quote=ana]\ntext");
    let output = run(&["validate", input.to_str().expect("path")]);

    assert!(!output.status.success(), "expected error exit code");
    assert!(stdout(&output).contains(":error E_QUOTE_UNBALANCED "));
}

#[test]
fn validate_clean_post_prints_nothing() {
    let input = temp_file("clean", "fc", "[record]123[/record] ok");
    let output = run(&["validate", "--diagnostics", "json", input.to_str().expect("path")]);

    assert!(output.status.success());
    assert_eq!(stdout(&output).trim(), "[]");
}

#[test]
fn location_flags_build_topic_permalinks() {
    let input = temp_file("quote", "fc", "[quote post_id=\"a1\"]x[/quote]");
    let output = run(&[
        "render",
        "--category",
        "pescuit",
        "--subcategory",
        "crap",
        "--topic",
        "snagov",
        "--post-number",
        "a1=4",
        input.to_str().expect("path"),
    ]);

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(stdout(&output).contains("href=\"/forum/pescuit/crap/snagov#post4\""));
}

#[test]
fn topic_without_subcategory_is_rejected() {
    let output = run(&["render", "--topic", "snagov", "missing.fc"]);
    assert!(!output.status.success());
}

#[test]
fn config_file_and_environment_are_layered() {
    let config = temp_file(
        "config",
        "toml",
        "forum_base = \"/comunitate\"\nquote_link_label = \"Vezi postarea\"\n",
    );
    let input = temp_file("layered", "fc", "[quote post_id=\"9\"]x[/quote]");

    let output = run(&[
        "--config",
        config.to_str().expect("path"),
        "render",
        input.to_str().expect("path"),
    ]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let html = stdout(&output);
    assert!(html.contains("href=\"/comunitate/post/9\""), "html: {}", html);
    assert!(html.contains(">Vezi postarea</a>"), "html: {}", html);

    let output = Command::new(bin_path())
        .args([
            "--config",
            config.to_str().expect("path"),
            "render",
            input.to_str().expect("path"),
        ])
        .env("FORUMCODE_FORUM_BASE", "/club")
        .output()
        .expect("run");
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(stdout(&output).contains("href=\"/club/post/9\""));

    let output = run(&[
        "--config",
        config.to_str().expect("path"),
        "render",
        "--forum-base",
        "/flag/",
        input.to_str().expect("path"),
    ]);
    assert!(stdout(&output).contains("href=\"/flag/post/9\""));
}

#[test]
fn missing_config_file_fails() {
    let input = temp_file("noconfig", "fc", "x");
    let output = run(&[
        "--config",
        "/nonexistent/forumcode.toml",
        "render",
        input.to_str().expect("path"),
    ]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("failed to load configuration"));
}

#[test]
fn excerpt_truncates() {
    let input = temp_file("excerpt", "fc", "[b]Captura[/b] de azi pe lac");
    let output = run(&["excerpt", "--max-chars", "10", input.to_str().expect("path")]);

    assert!(output.status.success());
    assert_eq!(stdout(&output), "Captura de…\n");
}

#[test]
fn unreadable_input_fails() {
    let output = run(&["render", "/nonexistent/post.fc"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("failed to read /nonexistent/post.fc"));
}

#[cfg(target_os = "linux")]
#[test]
fn write_failures_are_reported() {
    let input = temp_file("full", "fc", "[b]x[/b]");
    let full = fs::OpenOptions::new()
        .write(true)
        .open("/dev/full")
        .expect("open /dev/full");
    let output = Command::new(bin_path())
        .args(["render", input.to_str().expect("path")])
        .stdout(Stdio::from(full))
        .output()
        .expect("run");

    assert!(!output.status.success());
    assert!(stderr(&output).contains("failed to write output"));
}
