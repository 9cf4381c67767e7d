#![allow(dead_code)]

pub const BASE_ENV: &[(&str, &str)] = &[
    ("S3_ENDPOINT", "http://127.0.0.1:9"),
    ("S3_ACCESS_KEY_ID", "test-access"),
    ("S3_SECRET_ACCESS_KEY", "test-secret"),
    ("S3_BUCKET", "datasets"),
];

pub fn build_pdf(pages: &[&str]) -> Vec<u8> {
    vlm_datasets::extract::fixtures::pdf_from_pages(pages).unwrap()
}
