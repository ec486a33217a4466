use std::ffi::OsStr;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;
use base64::prelude::BASE64_STANDARD;
use base64::Engine;
use tracing::{debug, info};

use crate::ai;
use crate::ordering;
use crate::tools;

/// Text read off one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TextSnippet {
    pub image: PathBuf,
    pub text: String,
}

pub(crate) trait TextRecognizer {
    async fn recognize(&self, image: &Path) -> anyhow::Result<String>;
}

pub(crate) struct Tesseract {
    program: PathBuf,
}

impl Tesseract {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl TextRecognizer for Tesseract {
    async fn recognize(&self, image: &Path) -> anyhow::Result<String> {
        let text = tools::run(&self.program, [image.as_os_str(), OsStr::new("stdout")]).await?;
        Ok(text)
    }
}

/// Sends frames to GPT-4o as base64 JPEG data URLs.
pub(crate) struct OpenAiVision;

impl TextRecognizer for OpenAiVision {
    async fn recognize(&self, image: &Path) -> anyhow::Result<String> {
        let jpeg_data = tokio::fs::read(image).await?;
        ai::transcribe_image(jpeg_data_url(&jpeg_data)).await
    }
}

fn jpeg_data_url(jpeg_data: &[u8]) -> String {
    "data:image/jpeg;base64,".to_owned() + &BASE64_STANDARD.encode(jpeg_data)
}

/// Trims every line and drops blank ones.
fn normalize(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Runs `recognizer` over every frame in `dir`, in frame order. Frames without
/// text produce no snippet.
pub(crate) async fn recognize_dir<R: TextRecognizer>(
    recognizer: &R,
    dir: &Path,
) -> anyhow::Result<Vec<TextSnippet>> {
    info!("Recognizing text...");
    let mut snippets = Vec::new();
    for image in ordering::list_frames(dir)? {
        let raw = recognizer
            .recognize(&image)
            .await
            .with_context(|| format!("text recognition failed for {}", image.display()))?;
        let text = normalize(&raw);
        if text.is_empty() {
            debug!("no text in {}", image.display());
            continue;
        }
        info!(
            "{}: {}",
            image.file_name().unwrap_or_default().to_string_lossy(),
            text.replace('\n', " | ")
        );
        snippets.push(TextSnippet { image, text });
    }
    info!("Recognized text in {} frames", snippets.len());
    Ok(snippets)
}

pub(crate) fn write_snippets(path: &Path, snippets: &[TextSnippet]) -> std::io::Result<()> {
    let mut file = std::io::BufWriter::new(fs::File::create(path)?);
    for snippet in snippets {
        let name = snippet.image.file_name().unwrap_or_default().to_string_lossy();
        writeln!(file, "[{}]\n{}\n", name, snippet.text)?;
    }
    file.flush()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FileContents;

    impl TextRecognizer for FileContents {
        async fn recognize(&self, image: &Path) -> anyhow::Result<String> {
            Ok(fs::read_to_string(image)?)
        }
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("  Hello \n\n\tWorld\n \x0c"), "Hello\nWorld");
        assert_eq!(normalize(" \n "), "");
    }

    #[test]
    fn test_data_url() {
        assert_eq!(jpeg_data_url(b"abc"), "data:image/jpeg;base64,YWJj");
    }

    #[tokio::test]
    async fn test_recognize_dir_orders_and_skips_empty() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("scene_2_frame_1.jpg"), "second").unwrap();
        fs::write(dir.path().join("scene_1_frame_1.jpg"), " first \n").unwrap();
        fs::write(dir.path().join("scene_1_frame_2.jpg"), "   ").unwrap();

        let snippets = recognize_dir(&FileContents, dir.path()).await.unwrap();
        let texts: Vec<_> = snippets.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, ["first", "second"]);

        let out = dir.path().join("recognized_text.txt");
        write_snippets(&out, &snippets).unwrap();
        let written = fs::read_to_string(out).unwrap();
        assert!(written.starts_with("[scene_1_frame_1.jpg]\nfirst\n"));
    }

    #[tokio::test]
    async fn test_tesseract_reports_missing_program() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("scene_1_frame_1.jpg"), "x").unwrap();
        let recognizer = Tesseract::new(dir.path().join("no-such-tesseract"));
        assert!(recognize_dir(&recognizer, dir.path()).await.is_err());
    }
}
