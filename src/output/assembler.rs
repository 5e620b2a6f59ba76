use crate::output::collector::EncodedChunk;

/// The finished recording, ready for download
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputArtifact {
    pub bytes: Vec<u8>,
    pub mime_type: String,
    pub suggested_filename: String,
}

impl OutputArtifact {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Concatenates chunk payloads into one artifact
///
/// No reframing or container validation happens here: muxed output is already
/// a valid container, and raw bitstream output deliberately has none.
pub struct OutputAssembler;

impl OutputAssembler {
    pub fn assemble(chunks: &[EncodedChunk], mime_type: &str, filename: &str) -> OutputArtifact {
        let total = chunks.iter().map(EncodedChunk::len).sum();
        let mut bytes = Vec::with_capacity(total);
        for chunk in chunks {
            bytes.extend_from_slice(&chunk.payload);
        }

        OutputArtifact {
            bytes,
            mime_type: mime_type.to_string(),
            suggested_filename: filename.to_string(),
        }
    }
}
