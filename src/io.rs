use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::Serialize;
use tokio::{fs, io::AsyncWriteExt};

use crate::media::GeneratedImage;
use crate::settings::Preset;

#[derive(Serialize)]
struct Sidecar<'a> {
    id: &'a str,
    seed: u32,
    mime_type: &'a str,
    preset: Preset,
    prompt: &'a str,
    model: &'a str,
    created_at: String,
}

/// What the sidecar records about the request that produced an image.
pub struct SaveContext<'a> {
    pub preset: Preset,
    pub prompt: &'a str,
    pub model: &'a str,
}

async fn write_atomic(tmp: &Path, dst: &Path, bytes: &[u8]) -> std::io::Result<()> {
    {
        let mut f = fs::File::create(tmp).await?;
        f.write_all(bytes).await?;
        let _ = f.sync_all().await; // best-effort
    }
    fs::rename(tmp, dst).await
}

/// Writes `studiomimic-<id>.<ext>` plus a `.json` sidecar. Returns the image path.
pub async fn save_output(out_dir: &Path, img: &GeneratedImage, ctx: &SaveContext<'_>) -> std::io::Result<PathBuf> {
    fs::create_dir_all(out_dir).await?;

    let stem = format!("studiomimic-{}", img.id);
    let image_path = out_dir.join(format!("{stem}.{}", img.extension()));
    let json_path = out_dir.join(format!("{stem}.json"));

    write_atomic(&out_dir.join(format!("{stem}.img.tmp")), &image_path, &img.bytes).await?;

    let sidecar = Sidecar {
        id: &img.id,
        seed: img.seed,
        mime_type: &img.mime_type,
        preset: ctx.preset,
        prompt: ctx.prompt,
        model: ctx.model,
        created_at: Utc::now().to_rfc3339(),
    };
    let sidecar_bytes = serde_json::to_vec_pretty(&sidecar)?;
    write_atomic(&out_dir.join(format!("{stem}.json.tmp")), &json_path, &sidecar_bytes).await?;
    Ok(image_path)
}
