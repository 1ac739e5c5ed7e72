// Assembler: concatenates ordered segment buffers into one artifact.

use std::path::Path;

use bytes::{Bytes, BytesMut};
use tracing::debug;

use crate::error::Result;
use crate::manifest::path_has_extension;

/// The reassembled output object.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub bytes: Bytes,
    pub content_type: &'static str,
}

/// Content type for the segment container referenced by `segment_url`.
pub fn content_type_for(segment_url: &str) -> &'static str {
    if path_has_extension(segment_url, &[".ts"]) {
        "video/mp2t"
    } else if path_has_extension(segment_url, &[".m4s"]) {
        "video/mp4"
    } else {
        "application/octet-stream"
    }
}

/// Copies each buffer, in order, into one contiguous allocation.
///
/// For separated renditions the caller passes audio buffers followed by
/// video buffers. That is plain concatenation, not container muxing: the
/// result carries both streams back to back and may not play correctly in
/// every player. Proper interleaving is explicitly out of scope.
pub fn assemble(buffers: &[Bytes], content_type: &'static str) -> Artifact {
    let total: usize = buffers.iter().map(Bytes::len).sum();
    let mut out = BytesMut::with_capacity(total);
    for buffer in buffers {
        out.extend_from_slice(buffer);
    }
    debug!(parts = buffers.len(), bytes = total, content_type, "assembled artifact");
    Artifact {
        bytes: out.freeze(),
        content_type,
    }
}

/// Persists the artifact. The written file is the only externally visible
/// side effect of a successful job.
pub async fn write_artifact(artifact: &Artifact, path: &Path) -> Result<()> {
    tokio::fs::write(path, &artifact.bytes).await?;
    debug!(path = %path.display(), bytes = artifact.bytes.len(), "wrote artifact");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concatenates_buffers_in_order_at_correct_offsets() {
        let parts = vec![
            Bytes::from_static(b"aaa"),
            Bytes::from_static(b""),
            Bytes::from_static(b"bb"),
            Bytes::from_static(b"cccc"),
        ];
        let artifact = assemble(&parts, "video/mp2t");
        assert_eq!(artifact.bytes.as_ref(), b"aaabbcccc");
        assert_eq!(artifact.content_type, "video/mp2t");
    }

    #[test]
    fn empty_input_yields_empty_artifact() {
        let artifact = assemble(&[], "video/mp2t");
        assert!(artifact.bytes.is_empty());
    }

    #[test]
    fn infers_content_type_from_segment_container() {
        assert_eq!(
            content_type_for("https://cdn.example/seg0.ts?sig=a"),
            "video/mp2t"
        );
        assert_eq!(content_type_for("https://cdn.example/chunk.m4s"), "video/mp4");
        assert_eq!(
            content_type_for("https://cdn.example/blob.bin"),
            "application/octet-stream"
        );
    }

    #[tokio::test]
    async fn writes_artifact_to_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("out.ts");
        let artifact = assemble(&[Bytes::from_static(b"abc")], "video/mp2t");

        write_artifact(&artifact, &path).await.expect("write should succeed");

        assert_eq!(std::fs::read(&path).expect("read back"), b"abc");
    }
}
