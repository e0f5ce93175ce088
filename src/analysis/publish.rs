use aws_sdk_s3::primitives::ByteStream;
use flate2::Compression;
use flate2::write::GzEncoder;
use serde::Serialize;
use std::io::Write;
use tracing::info;

/// S3 object key for an aggregate of `name`, with a `.gz` suffix when compressed.
pub fn object_key(name: &str, gzip: bool) -> String {
    if gzip {
        format!("aggregates/{name}.json.gz")
    } else {
        format!("aggregates/{name}.json")
    }
}

/// Serializes `value` to JSON, gzip-compressing it if asked.
pub fn encode_json(value: &impl Serialize, gzip: bool) -> anyhow::Result<Vec<u8>> {
    let body = serde_json::to_vec(value)?;
    if !gzip {
        return Ok(body);
    }
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&body)?;
    Ok(encoder.finish()?)
}

/// Serializes a value to JSON and uploads it to an S3 bucket with `application/json` content type.
pub async fn write_json_to_s3(
    client: &aws_sdk_s3::Client,
    bucket: &str,
    key: &str,
    value: &impl Serialize,
    gzip: bool,
) -> anyhow::Result<()> {
    let body = encode_json(value, gzip)?;
    let size = body.len();

    let mut request = client
        .put_object()
        .bucket(bucket)
        .key(key)
        .body(ByteStream::from(body))
        .content_type("application/json");
    if gzip {
        request = request.content_encoding("gzip");
    }
    request.send().await?;

    info!(bucket, key, size, gzip, "Uploaded JSON to S3");
    Ok(())
}
