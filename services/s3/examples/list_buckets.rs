use anyhow::Result;
use s3sign_core::{Context, OsEnv};
use s3sign_file_read_tokio::TokioFileRead;
use s3sign_http_send_reqwest::ReqwestHttpSend;
use s3sign_s3::S3;

/// Lists every bucket, and the objects of the bucket named by the first
/// argument if one is given.
#[tokio::main]
async fn main() -> Result<()> {
    let _ = env_logger::builder().is_test(true).try_init();

    let ctx = Context::new()
        .with_file_read(TokioFileRead)
        .with_http_send(ReqwestHttpSend::default())
        .with_env(OsEnv);
    let s3 = S3::load(ctx).await?;

    let output = s3.list_buckets().await?;
    println!("owner: {} ({})", output.owner.display_name, output.owner.id);
    for bucket in &output.buckets {
        println!("{:>40} {}", bucket.name, bucket.creation_date);
    }

    if let Some(bucket) = std::env::args().nth(1) {
        for object in s3.list_objects(&bucket).await? {
            println!("{:>12} {} {}", object.size, object.last_modified, object.key);
        }
    }

    Ok(())
}
