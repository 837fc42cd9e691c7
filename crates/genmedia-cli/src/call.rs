use std::path::Path;

use anyhow::{Context, Result, bail};
use base64::Engine;
use serde_json::{Value, json};

use genmedia_delivery::{extension_for, generate_filename};

/// Post one `tools/call` to the gateway and print its content blocks.
pub async fn run_call(url: &str, tool: &str, args: &str, save_dir: Option<&Path>) -> Result<()> {
    let arguments: Value = serde_json::from_str(args).context("--args must be a JSON object")?;
    if !arguments.is_object() {
        bail!("--args must be a JSON object");
    }

    let request = json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": "tools/call",
        "params": { "name": tool, "arguments": arguments },
    });
    let response: Value = reqwest::Client::new()
        .post(url)
        .json(&request)
        .send()
        .await
        .with_context(|| format!("Failed to reach gateway at {url}"))?
        .json()
        .await
        .context("Failed to parse response")?;

    if let Some(error) = response.get("error") {
        bail!(
            "{} (code {})",
            error["message"].as_str().unwrap_or("unknown error"),
            error["code"]
        );
    }

    let result = &response["result"];
    for block in result["content"].as_array().into_iter().flatten() {
        print_block(block, save_dir)?;
    }
    if result["isError"].as_bool() == Some(true) {
        bail!("{tool} reported an error");
    }
    Ok(())
}

/// GET `<url>/health` and print the body.
pub async fn run_health(url: &str) -> Result<()> {
    let endpoint = format!("{}/health", url.trim_end_matches('/'));
    let resp = reqwest::get(&endpoint)
        .await
        .with_context(|| format!("Failed to reach {endpoint}"))?;
    let status = resp.status();
    let body: Value = resp.json().await.context("Failed to parse health response")?;
    println!("{}", serde_json::to_string_pretty(&body)?);
    if !status.is_success() {
        bail!("gateway answered {status}");
    }
    Ok(())
}

fn print_block(block: &Value, save_dir: Option<&Path>) -> Result<()> {
    match block["type"].as_str() {
        Some("text") => println!("{}", block["text"].as_str().unwrap_or_default()),
        Some("image") | Some("audio") => print_binary(
            block["data"].as_str().unwrap_or_default(),
            block["mimeType"].as_str().unwrap_or("application/octet-stream"),
            save_dir,
        )?,
        Some("resource") => print_binary(
            block["resource"]["blob"].as_str().unwrap_or_default(),
            block["resource"]["mimeType"]
                .as_str()
                .unwrap_or("application/octet-stream"),
            save_dir,
        )?,
        other => println!("[unrecognized content block: {}]", other.unwrap_or("?")),
    }
    Ok(())
}

fn print_binary(data: &str, mime_type: &str, save_dir: Option<&Path>) -> Result<()> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(data)
        .context("invalid base64 payload")?;
    match save_dir {
        Some(dir) => {
            let path = save_binary(&bytes, mime_type, dir)?;
            println!("[{mime_type}] saved to {} ({} bytes)", path.display(), bytes.len());
        }
        None => println!(
            "[{mime_type}: {} bytes, pass --save-dir to write it out]",
            bytes.len()
        ),
    }
    Ok(())
}

fn save_binary(bytes: &[u8], mime_type: &str, dir: &Path) -> Result<std::path::PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create {}", dir.display()))?;
    let name = generate_filename("genmedia", extension_for(mime_type), chrono::Utc::now());
    let path = dir.join(name);
    std::fs::write(&path, bytes).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_binary_uses_mime_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = save_binary(b"RIFF", "audio/wav", &dir.path().join("out")).unwrap();
        assert_eq!(path.extension().unwrap(), "wav");
        assert!(path.file_name().unwrap().to_str().unwrap().starts_with("genmedia-"));
        assert_eq!(std::fs::read(&path).unwrap(), b"RIFF");
    }

    #[test]
    fn test_print_binary_rejects_bad_base64() {
        assert!(print_binary("***", "image/png", None).is_err());
    }
}
