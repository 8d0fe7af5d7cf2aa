//! Zips a function's asset directory and ships it to the artifact bucket.

use std::io::{Cursor, Write};
use std::path::PathBuf;

use aws_cfn_stack::assets::collect_files;
use aws_cfn_stack::AssetError;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{BucketLocationConstraint, CreateBucketConfiguration};
use tracing::{debug, info};
use zip::write::FileOptions;

/// A function's code directory plus the template parameters that point at it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LambdaAsset {
    pub resource_name: String,
    pub asset_dir: PathBuf,
    pub bucket_param: String,
    pub key_param: String,
}

#[derive(Debug, Clone)]
pub struct PackagedAsset {
    pub bytes: Vec<u8>,
    pub checksum: u32,
    /// `{resource_name}_{checksum}.zip`, so unchanged code maps to the same key.
    pub key: String,
}

impl LambdaAsset {
    pub fn package(&self) -> Result<PackagedAsset, AssetError> {
        let files = collect_files(&self.asset_dir)?;
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        // fixed timestamps and permissions keep the archive byte-identical between runs.
        let options = FileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated)
            .last_modified_time(zip::DateTime::default())
            .unix_permissions(0o644);
        let package_err = |message: String| AssetError::Package { path: self.asset_dir.clone(), message };
        for file in files.iter() {
            let contents = std::fs::read(&file.path).map_err(|e| AssetError::io(&file.path, e))?;
            writer
                .start_file(file.key.clone(), options)
                .map_err(|e| package_err(e.to_string()))?;
            writer.write_all(&contents).map_err(|e| AssetError::io(&file.path, e))?;
        }
        let bytes = writer.finish().map_err(|e| package_err(e.to_string()))?.into_inner();
        let checksum = adler::adler32_slice(&bytes);
        let key = format!("{}_{:08x}.zip", self.resource_name, checksum);
        debug!(asset = %self.asset_dir.display(), files = files.len(), %key, "packaged lambda asset");
        Ok(PackagedAsset { bytes, checksum, key })
    }

    /// template parameter values for an uploaded package.
    pub fn parameter_values(&self, bucket: &str, packaged: &PackagedAsset) -> Vec<(String, String)> {
        vec![
            (self.bucket_param.clone(), bucket.to_string()),
            (self.key_param.clone(), packaged.key.clone()),
        ]
    }
}

fn s3_err<E: std::error::Error + 'static>(op: &'static str, bucket: &str, e: E) -> AssetError {
    AssetError::S3 {
        op,
        bucket: bucket.to_string(),
        message: DisplayErrorContext(&e).to_string(),
    }
}

pub async fn ensure_artifact_bucket(client: &aws_sdk_s3::Client, bucket: &str, region: &str) -> Result<(), AssetError> {
    if client.head_bucket().bucket(bucket).send().await.is_ok() {
        return Ok(());
    }
    info!(bucket, region, "creating artifact bucket");
    let mut req = client.create_bucket().bucket(bucket);
    if let Some(location) = aws_regions::bucket_location_constraint(region) {
        req = req.create_bucket_configuration(
            CreateBucketConfiguration::builder()
                .location_constraint(BucketLocationConstraint::from(location))
                .build(),
        );
    }
    req.send().await.map_err(|e| s3_err("CreateBucket", bucket, e))?;
    Ok(())
}

/// uploads unless an object with the same checksummed key is already there.
pub async fn upload_artifact(client: &aws_sdk_s3::Client, bucket: &str, packaged: &PackagedAsset) -> Result<(), AssetError> {
    if client.head_object().bucket(bucket).key(&packaged.key).send().await.is_ok() {
        debug!(bucket, key = %packaged.key, "artifact already uploaded");
        return Ok(());
    }
    info!(bucket, key = %packaged.key, bytes = packaged.bytes.len(), "uploading lambda artifact");
    client
        .put_object()
        .bucket(bucket)
        .key(&packaged.key)
        .content_type("application/zip")
        .body(ByteStream::from(packaged.bytes.clone()))
        .send()
        .await
        .map_err(|e| s3_err("PutObject", bucket, e))?;
    Ok(())
}
