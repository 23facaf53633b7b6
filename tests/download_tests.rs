use openalex_taxonomy::download::{collect_oa_papers, looks_like_pdf, DownloadArgs};
use serde_json::json;
use std::fs;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn detail_file(dir: &std::path::Path, name: &str, papers: serde_json::Value) {
    let record = json!({
        "professor_info": {"author_id": "A1", "name": "Prof", "department": "cs", "total_papers": 1},
        "papers": papers,
    });
    fs::write(dir.join(name), serde_json::to_string(&record).unwrap()).unwrap();
}

fn pdf_body() -> Vec<u8> {
    let mut body = b"%PDF-1.7\n".to_vec();
    body.resize(2048, b' ');
    body
}

#[test]
fn test_looks_like_pdf_requires_magic_and_minimum_size() {
    assert!(looks_like_pdf(&pdf_body()));
    assert!(!looks_like_pdf(b"%PDF-1.7 too small"));

    let mut html = b"<!DOCTYPE html><html>error page</html>".to_vec();
    html.resize(4096, b' ');
    assert!(!looks_like_pdf(&html));
}

#[test]
fn test_collect_oa_papers_filters_and_deduplicates() {
    let temp_dir = TempDir::new().unwrap();

    detail_file(
        temp_dir.path(),
        "a_A1_detail.json",
        json!([
            {
                "id": "https://openalex.org/W1",
                "title": "Open Paper",
                "open_access": {"is_oa": true, "oa_url": "https://example.org/w1.pdf"},
            },
            {
                "id": "https://openalex.org/W2",
                "title": "Closed Paper",
                "open_access": {"is_oa": false, "oa_url": "https://example.org/w2.pdf"},
            },
            {
                "id": "https://openalex.org/W3",
                "title": "No URL",
                "open_access": {"is_oa": true},
            },
            {"id": "https://openalex.org/W4", "title": "No OA info"},
            null,
        ]),
    );
    // Same work appears in a second professor's file
    detail_file(
        temp_dir.path(),
        "b_A2_detail.json",
        json!([
            {
                "id": "https://openalex.org/W1",
                "title": "Open Paper",
                "open_access": {"is_oa": true, "oa_url": "https://example.org/w1.pdf"},
            },
        ]),
    );

    let papers = collect_oa_papers(temp_dir.path()).unwrap();

    assert_eq!(papers.len(), 1);
    assert_eq!(papers[0].openalex_id, "W1");
    assert_eq!(papers[0].oa_url, "https://example.org/w1.pdf");
}

#[test]
fn test_collect_oa_papers_skips_unparsable_files() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join("bad_A1_detail.json"), "nope").unwrap();
    detail_file(
        temp_dir.path(),
        "good_A2_detail.json",
        json!([
            {
                "id": "https://openalex.org/W1",
                "title": "Open Paper",
                "open_access": {"is_oa": true, "oa_url": "https://example.org/w1.pdf"},
            },
        ]),
    );

    let papers = collect_oa_papers(temp_dir.path()).unwrap();
    assert_eq!(papers.len(), 1);
}

#[tokio::test]
async fn test_download_keeps_pdf_and_rejects_html() {
    let temp_dir = TempDir::new().unwrap();
    let input_dir = temp_dir.path().join("input");
    let output_dir = temp_dir.path().join("pdfs");
    fs::create_dir_all(&input_dir).unwrap();

    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/w1.pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(pdf_body()))
        .mount(&mock_server)
        .await;
    let mut html = b"<html>not a pdf</html>".to_vec();
    html.resize(4096, b' ');
    Mock::given(method("GET"))
        .and(path("/w2.pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(html))
        .mount(&mock_server)
        .await;

    detail_file(
        &input_dir,
        "prof_A1_detail.json",
        json!([
            {
                "id": "https://openalex.org/W1",
                "title": "Real PDF",
                "open_access": {"is_oa": true, "oa_url": format!("{}/w1.pdf", mock_server.uri())},
            },
            {
                "id": "https://openalex.org/W2",
                "title": "HTML Page",
                "open_access": {"is_oa": true, "oa_url": format!("{}/w2.pdf", mock_server.uri())},
            },
        ]),
    );

    let args = DownloadArgs {
        input: input_dir,
        output: output_dir.clone(),
        concurrency: 2,
        timeout: 5,
    };
    openalex_taxonomy::download::run_async(args).await.unwrap();

    assert!(output_dir.join("W1.pdf").exists());
    assert!(!output_dir.join("W2.pdf").exists());

    let saved = fs::read(output_dir.join("W1.pdf")).unwrap();
    assert!(saved.starts_with(b"%PDF"));
}

#[tokio::test]
async fn test_download_skips_existing_files() {
    let temp_dir = TempDir::new().unwrap();
    let input_dir = temp_dir.path().join("input");
    let output_dir = temp_dir.path().join("pdfs");
    fs::create_dir_all(&input_dir).unwrap();
    fs::create_dir_all(&output_dir).unwrap();

    // Pre-existing download must not be re-fetched; no server is running.
    fs::write(output_dir.join("W1.pdf"), b"%PDF already here").unwrap();

    detail_file(
        &input_dir,
        "prof_A1_detail.json",
        json!([
            {
                "id": "https://openalex.org/W1",
                "title": "Already Downloaded",
                "open_access": {"is_oa": true, "oa_url": "http://127.0.0.1:9/w1.pdf"},
            },
        ]),
    );

    let args = DownloadArgs {
        input: input_dir,
        output: output_dir.clone(),
        concurrency: 1,
        timeout: 1,
    };
    openalex_taxonomy::download::run_async(args).await.unwrap();

    let saved = fs::read(output_dir.join("W1.pdf")).unwrap();
    assert_eq!(saved, b"%PDF already here");
}
