//! Copies local files into a deployed bucket after the stack is applied.
//!
//! The destination is only known once CloudFormation reports the stack
//! outputs, so a deployment names the output holding the bucket name instead
//! of the bucket itself.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use aws_cfn_stack::assets::{collect_files, content_type_for, AssetFile};
use aws_cfn_stack::AssetError;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use base64::Engine;
use md5::{Digest, Md5};
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetSource {
    /// every file under the directory, keyed by relative path.
    Directory(PathBuf),
    /// one file uploaded under `key`.
    File { path: PathBuf, key: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketDeployment {
    pub name: String,
    pub source: AssetSource,
    /// stack output whose value is the destination bucket name.
    pub bucket_output: String,
    pub key_prefix: String,
    /// delete objects under `key_prefix` that are not part of the source.
    pub prune: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub uploaded: Vec<String>,
    pub unchanged: Vec<String>,
    pub deleted: Vec<String>,
}

/// one file ready to upload.
#[derive(Debug, Clone)]
pub struct PreparedObject {
    pub key: String,
    pub body: Vec<u8>,
    pub content_type: String,
    /// hex md5, comparable with the ETag of an unencrypted single part upload.
    pub md5_hex: String,
    /// base64 md5 for the `Content-MD5` header.
    pub content_md5: String,
}

impl BucketDeployment {
    pub fn files(&self) -> Result<Vec<AssetFile>, AssetError> {
        match &self.source {
            AssetSource::Directory(dir) => collect_files(dir),
            AssetSource::File { path, key } => {
                if !path.is_file() {
                    return Err(AssetError::io(path, std::io::Error::from(std::io::ErrorKind::NotFound)));
                }
                Ok(vec![AssetFile { key: key.clone(), path: path.clone() }])
            }
        }
    }

    pub fn prepare(&self) -> Result<Vec<PreparedObject>, AssetError> {
        let mut out = vec![];
        for file in self.files()? {
            let body = std::fs::read(&file.path).map_err(|e| AssetError::io(&file.path, e))?;
            let digest = Md5::digest(&body);
            let key = format!("{}{}", self.key_prefix, file.key);
            out.push(PreparedObject {
                content_type: content_type_for(&key),
                md5_hex: hex::encode(digest),
                content_md5: base64::engine::general_purpose::STANDARD.encode(digest),
                key,
                body,
            });
        }
        Ok(out)
    }

    pub fn destination<'a>(&self, stack_outputs: &'a HashMap<String, String>) -> Result<&'a str, AssetError> {
        stack_outputs
            .get(&self.bucket_output)
            .map(String::as_str)
            .ok_or_else(|| AssetError::MissingOutput(self.bucket_output.clone()))
    }

    pub async fn run(&self, client: &aws_sdk_s3::Client, stack_outputs: &HashMap<String, String>) -> Result<SyncReport, AssetError> {
        let bucket = self.destination(stack_outputs)?;
        let objects = self.prepare()?;
        let existing = list_etags(client, bucket, &self.key_prefix).await?;
        info!(deployment = %self.name, bucket, files = objects.len(), "syncing assets");

        let report = plan(&existing, &objects, self.prune);
        for object in objects.iter().filter(|o| report.uploaded.contains(&o.key)) {
            debug!(bucket, key = %object.key, content_type = %object.content_type, "uploading");
            client
                .put_object()
                .bucket(bucket)
                .key(&object.key)
                .content_type(&object.content_type)
                .content_md5(&object.content_md5)
                .body(ByteStream::from(object.body.clone()))
                .send()
                .await
                .map_err(|e| s3_err("PutObject", bucket, e))?;
        }
        for stale in &report.deleted {
            debug!(bucket, key = %stale, "pruning");
            client
                .delete_object()
                .bucket(bucket)
                .key(stale)
                .send()
                .await
                .map_err(|e| s3_err("DeleteObject", bucket, e))?;
        }
        info!(
            deployment = %self.name,
            uploaded = report.uploaded.len(),
            unchanged = report.unchanged.len(),
            deleted = report.deleted.len(),
            "assets synced"
        );
        Ok(report)
    }
}

/// which objects to upload, which to leave alone and which to delete, given
/// the ETags already under the prefix. An object is unchanged only when its
/// ETag equals the local md5.
pub fn plan(existing: &HashMap<String, String>, objects: &[PreparedObject], prune: bool) -> SyncReport {
    let mut report = SyncReport::default();
    for object in objects {
        if existing.get(&object.key).is_some_and(|etag| *etag == object.md5_hex) {
            report.unchanged.push(object.key.clone());
        } else {
            report.uploaded.push(object.key.clone());
        }
    }
    if prune {
        let wanted: HashSet<&str> = objects.iter().map(|o| o.key.as_str()).collect();
        report.deleted = stale_keys(existing.keys(), &wanted);
    }
    report
}

fn stale_keys<'a>(existing: impl Iterator<Item = &'a String>, wanted: &HashSet<&str>) -> Vec<String> {
    let mut stale: Vec<String> = existing.filter(|k| !wanted.contains(k.as_str())).cloned().collect();
    stale.sort();
    stale
}

fn s3_err<E: std::error::Error + 'static>(op: &'static str, bucket: &str, e: E) -> AssetError {
    AssetError::S3 {
        op,
        bucket: bucket.to_string(),
        message: DisplayErrorContext(&e).to_string(),
    }
}

/// key -> unquoted ETag for everything under `prefix`.
async fn list_etags(client: &aws_sdk_s3::Client, bucket: &str, prefix: &str) -> Result<HashMap<String, String>, AssetError> {
    let mut out = HashMap::new();
    let mut token: Option<String> = None;
    loop {
        let mut req = client.list_objects_v2().bucket(bucket).set_continuation_token(token.take());
        if !prefix.is_empty() {
            req = req.prefix(prefix);
        }
        let page = req.send().await.map_err(|e| s3_err("ListObjectsV2", bucket, e))?;
        for object in page.contents() {
            if let Some(key) = object.key() {
                let etag = object.e_tag().unwrap_or_default().trim_matches('"').to_string();
                out.insert(key.to_string(), etag);
            }
        }
        match page.next_continuation_token() {
            Some(next) => token = Some(next.to_string()),
            None => break,
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn site(dir: PathBuf) -> BucketDeployment {
        BucketDeployment {
            name: "SiteDeployment".into(),
            source: AssetSource::Directory(dir),
            bucket_output: "SiteBucketName".into(),
            key_prefix: String::new(),
            prune: true,
        }
    }

    #[test]
    fn prepares_md5_and_content_type() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "").unwrap();
        let objects = site(dir.path().to_path_buf()).prepare().unwrap();
        assert_eq!(objects.len(), 1);
        assert_eq!(objects[0].key, "index.html");
        assert_eq!(objects[0].content_type, "text/html");
        // md5 of the empty string
        assert_eq!(objects[0].md5_hex, "d41d8cd98f00b204e9800998ecf8427e");
        assert_eq!(objects[0].content_md5, "1B2M2Y8AsgTpgAmY7PhCfg==");
    }

    #[test]
    fn single_file_uses_given_key_and_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("local-data.json");
        std::fs::write(&path, "{}").unwrap();
        let deployment = BucketDeployment {
            name: "DataDeployment".into(),
            source: AssetSource::File { path, key: "data.json".into() },
            bucket_output: "DataBucketName".into(),
            key_prefix: "v1/".into(),
            prune: false,
        };
        let objects = deployment.prepare().unwrap();
        assert_eq!(objects[0].key, "v1/data.json");
        assert_eq!(objects[0].content_type, "application/json");

        let missing = BucketDeployment {
            source: AssetSource::File { path: dir.path().join("nope.json"), key: "data.json".into() },
            ..deployment
        };
        assert!(matches!(missing.prepare(), Err(AssetError::Io { .. })));
    }

    #[test]
    fn destination_comes_from_stack_outputs() {
        let deployment = site(PathBuf::from("sources/site"));
        let mut outputs = HashMap::new();
        assert!(matches!(deployment.destination(&outputs), Err(AssetError::MissingOutput(_))));
        outputs.insert("SiteBucketName".to_string(), "blog.example.com".to_string());
        assert_eq!(deployment.destination(&outputs).unwrap(), "blog.example.com");
    }

    fn etags(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn plan_skips_matching_etags_and_prunes_the_rest() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "").unwrap();
        std::fs::write(dir.path().join("about.html"), "about").unwrap();
        std::fs::write(dir.path().join("new.css"), "body {}").unwrap();
        let deployment = site(dir.path().to_path_buf());
        let objects = deployment.prepare().unwrap();
        let existing = etags(&[
            ("index.html", "d41d8cd98f00b204e9800998ecf8427e"),
            ("about.html", "0123456789abcdef0123456789abcdef"),
            ("old/post.html", "d41d8cd98f00b204e9800998ecf8427e"),
            ("favicon.ico", "ffffffffffffffffffffffffffffffff"),
        ]);

        let report = plan(&existing, &objects, true);
        assert_eq!(report.uploaded, vec!["about.html".to_string(), "new.css".to_string()]);
        assert_eq!(report.unchanged, vec!["index.html".to_string()]);
        assert_eq!(report.deleted, vec!["favicon.ico".to_string(), "old/post.html".to_string()]);

        let kept = plan(&existing, &objects, false);
        assert_eq!(kept.uploaded, report.uploaded);
        assert!(kept.deleted.is_empty());
    }

    #[test]
    fn plan_uploads_everything_into_an_empty_bucket() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "<h1>hi</h1>").unwrap();
        let objects = site(dir.path().to_path_buf()).prepare().unwrap();
        let report = plan(&HashMap::new(), &objects, true);
        assert_eq!(report.uploaded, vec!["index.html".to_string()]);
        assert!(report.unchanged.is_empty() && report.deleted.is_empty());
    }

    #[test]
    fn stale_keys_are_sorted_and_exclude_wanted() {
        let existing = ["old.html".to_string(), "index.html".to_string(), "a.css".to_string()];
        let wanted: HashSet<&str> = ["index.html"].into_iter().collect();
        assert_eq!(stale_keys(existing.iter(), &wanted), vec!["a.css".to_string(), "old.html".to_string()]);
    }
}
