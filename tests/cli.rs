mod common;

use std::net::SocketAddr;
use std::process::Command;

use anyhow::Result;
use assert_cmd::prelude::*;
use assert_fs::prelude::*;
use axum::http::StatusCode;
use common::*;
use predicates::prelude::*;
use rstest::*;

/// 不读取运行环境中的 AWS 凭证与配置文件
fn isolated(name: &str) -> Result<Command> {
    let mut cmd = Command::cargo_bin(name)?;
    for key in [
        "AWS_ACCESS_KEY_ID",
        "AWS_SECRET_ACCESS_KEY",
        "AWS_SESSION_TOKEN",
        "AWS_PROFILE",
        "AWS_REGION",
        "AWS_DEFAULT_REGION",
    ] {
        cmd.env_remove(key);
    }
    cmd.env("AWS_SHARED_CREDENTIALS_FILE", "/nonexistent/aws/credentials")
        .env("AWS_CONFIG_FILE", "/nonexistent/aws/config");
    Ok(cmd)
}

macro_rules! cargo_run {
    ($cmd:expr, $($args:expr),*) => {
        {
            let mut cmd = isolated($cmd)?;
            $(cmd.arg($args);)*
            cmd.assert()
        }
    };
}

#[fixture]
fn images() -> assert_fs::TempDir {
    let dir = assert_fs::TempDir::new().unwrap();
    dir.child("a.jpg").write_binary(JPEG).unwrap();
    dir.child("b.png").write_binary(PNG).unwrap();
    dir.child("c.gif").write_binary(b"GIF89a").unwrap();
    dir
}

fn endpoint(addr: SocketAddr) -> String {
    format!("--endpoint=http://{addr}/")
}

#[rstest]
fn compare_match(images: assert_fs::TempDir) -> Result<()> {
    let fake = FakeRekognition::new(StatusCode::OK, ONE_MATCH);
    let addr = spawn_in_thread(fake.router());

    cargo_run!(
        "facecheck",
        "compare",
        endpoint(addr),
        images.child("a.jpg").path(),
        images.child("b.png").path()
    )
    .success()
    .stdout(predicate::str::contains("Similarity: 97.5%"));

    assert_eq!(fake.calls(), 1);
    Ok(())
}

#[rstest]
fn compare_no_match(images: assert_fs::TempDir) -> Result<()> {
    let fake = FakeRekognition::new(StatusCode::OK, NO_MATCH);
    let addr = spawn_in_thread(fake.router());

    cargo_run!(
        "facecheck",
        "compare",
        endpoint(addr),
        images.child("a.jpg").path(),
        images.child("b.png").path()
    )
    .success()
    .stdout(predicate::str::contains("No match found."));

    Ok(())
}

#[rstest]
fn compare_json_output(images: assert_fs::TempDir) -> Result<()> {
    let fake = FakeRekognition::new(StatusCode::OK, ONE_MATCH);
    let addr = spawn_in_thread(fake.router());

    cargo_run!(
        "facecheck",
        "compare",
        endpoint(addr),
        "--output-format=json",
        "--similarity-threshold=90",
        images.child("a.jpg").path(),
        images.child("b.png").path()
    )
    .success()
    .stdout(predicate::str::contains(r#""status": "match""#))
    .stdout(predicate::str::contains(r#""similarity": 97.5"#));

    assert_eq!(fake.last_body().unwrap()["SimilarityThreshold"], 90.0);
    Ok(())
}

#[rstest]
fn compare_service_unreachable(images: assert_fs::TempDir) -> Result<()> {
    cargo_run!(
        "facecheck",
        "compare",
        endpoint(closed_addr()),
        images.child("a.jpg").path(),
        images.child("b.png").path()
    )
    .failure()
    .stderr(predicate::str::contains("Error comparing images"));

    Ok(())
}

#[rstest]
fn compare_rejects_unsupported_format(images: assert_fs::TempDir) -> Result<()> {
    let fake = FakeRekognition::new(StatusCode::OK, ONE_MATCH);
    let addr = spawn_in_thread(fake.router());

    cargo_run!(
        "facecheck",
        "compare",
        endpoint(addr),
        images.child("c.gif").path(),
        images.child("b.png").path()
    )
    .failure()
    .stderr(predicate::str::contains("unsupported image format"));

    assert_eq!(fake.calls(), 0);
    Ok(())
}

#[rstest]
fn compare_missing_file(images: assert_fs::TempDir) -> Result<()> {
    cargo_run!(
        "facecheck",
        "compare",
        endpoint(closed_addr()),
        images.child("missing.jpg").path(),
        images.child("b.png").path()
    )
    .failure()
    .stderr(predicate::str::contains("No such file"));

    Ok(())
}

#[test]
fn threshold_out_of_range() -> Result<()> {
    cargo_run!("facecheck", "compare", "--similarity-threshold=150", "a.jpg", "b.jpg")
        .failure()
        .stderr(predicate::str::contains("0 到 100"));
    Ok(())
}

#[rstest]
fn compare_uses_profile_credentials(images: assert_fs::TempDir) -> Result<()> {
    let fake = FakeRekognition::new(StatusCode::OK, ONE_MATCH);
    let addr = spawn_in_thread(fake.router());
    images.child("credentials").write_str(
        "[default]\naws_access_key_id = AKIDDEFAULT\naws_secret_access_key = a\n\n\
         [work]\naws_access_key_id = AKIDWORK\naws_secret_access_key = b\n",
    )?;
    images.child("config").write_str("[profile work]\nregion = eu-central-1\n")?;

    isolated("facecheck")?
        .env("AWS_SHARED_CREDENTIALS_FILE", images.child("credentials").path())
        .env("AWS_CONFIG_FILE", images.child("config").path())
        .env("AWS_PROFILE", "work")
        .arg("compare")
        .arg(endpoint(addr))
        .arg(images.child("a.jpg").path())
        .arg(images.child("b.png").path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Similarity: 97.5%"));

    let headers = fake.last_headers().unwrap();
    let authorization = headers["authorization"].to_str()?;
    assert!(authorization.starts_with("AWS4-HMAC-SHA256 Credential=AKIDWORK/"));
    assert!(authorization.contains("/eu-central-1/rekognition/aws4_request"));
    Ok(())
}

#[rstest]
fn compare_without_credentials_refuses_aws(images: assert_fs::TempDir) -> Result<()> {
    cargo_run!(
        "facecheck",
        "compare",
        "--region=eu-west-1",
        images.child("a.jpg").path(),
        images.child("b.png").path()
    )
    .failure()
    .stderr(predicate::str::contains("未找到 AWS 凭证"));

    Ok(())
}

#[rstest]
fn compare_without_region_refuses_aws(images: assert_fs::TempDir) -> Result<()> {
    cargo_run!("facecheck", "compare", images.child("a.jpg").path(), images.child("b.png").path())
        .failure()
        .stderr(predicate::str::contains("未配置 AWS 区域"));

    Ok(())
}
