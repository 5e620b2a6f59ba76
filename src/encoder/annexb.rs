//! Splits an H.264 Annex-B byte stream into access units.
//!
//! The explicit encoder asks ffmpeg for access unit delimiters, so every
//! access unit starts with an AUD NAL (type 9). Bytes are buffered until the
//! next delimiter shows up, then the completed unit is handed out.

const NAL_IDR: u8 = 5;
const NAL_AUD: u8 = 9;

/// One complete access unit (one encoded frame)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessUnit {
    pub data: Vec<u8>,
    pub is_idr: bool,
}

impl AccessUnit {
    fn new(data: Vec<u8>) -> Self {
        let is_idr = nal_types(&data).any(|t| t == NAL_IDR);
        Self { data, is_idr }
    }
}

/// Incremental access unit splitter
#[derive(Debug, Default)]
pub struct AccessUnitSplitter {
    buf: Vec<u8>,
    scanned: usize,
}

impl AccessUnitSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed stream bytes, returning every access unit they complete
    pub fn push(&mut self, data: &[u8]) -> Vec<AccessUnit> {
        self.buf.extend_from_slice(data);

        let mut units = Vec::new();
        while let Some(end) = self.next_boundary() {
            let unit: Vec<u8> = self.buf.drain(..end).collect();
            units.push(AccessUnit::new(unit));
        }
        units
    }

    /// End of stream: whatever is buffered is the last access unit
    pub fn finish(self) -> Option<AccessUnit> {
        if self.buf.is_empty() {
            None
        } else {
            Some(AccessUnit::new(self.buf))
        }
    }

    /// Offset of the first AUD start code after the head of the buffer
    fn next_boundary(&mut self) -> Option<usize> {
        let buf = &self.buf;
        let mut i = self.scanned.max(1);

        while i + 3 < buf.len() {
            if buf[i] == 0 && buf[i + 1] == 0 && buf[i + 2] == 1 {
                if buf[i + 3] & 0x1f == NAL_AUD {
                    let start = if buf[i - 1] == 0 { i - 1 } else { i };
                    if start > 0 {
                        self.scanned = 0;
                        return Some(start);
                    }
                }
                i += 3;
            } else {
                i += 1;
            }
        }

        self.scanned = i;
        None
    }
}

/// NAL unit types in stream order
pub fn nal_types(data: &[u8]) -> impl Iterator<Item = u8> + '_ {
    let mut i = 0;
    std::iter::from_fn(move || {
        while i + 3 < data.len() {
            if data[i] == 0 && data[i + 1] == 0 && data[i + 2] == 1 {
                let nal_type = data[i + 3] & 0x1f;
                i += 3;
                return Some(nal_type);
            }
            i += 1;
        }
        None
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nal(header: u8, body: &[u8]) -> Vec<u8> {
        let mut out = vec![0, 0, 0, 1, header];
        out.extend_from_slice(body);
        out
    }

    fn stream() -> Vec<Vec<u8>> {
        let aud = nal(0x09, &[0xf0]);
        let sps = nal(0x67, &[0x42, 0x00, 0x1e]);
        let pps = nal(0x68, &[0xce, 0x38, 0x80]);
        let idr = nal(0x65, &[0x88, 0x84, 0x00, 0x00, 0x03]);
        let slice = nal(0x41, &[0x9a, 0x02]);

        vec![
            [aud.clone(), sps, pps, idr].concat(),
            [aud.clone(), slice.clone()].concat(),
            [aud, slice].concat(),
        ]
    }

    #[test]
    fn test_split_whole_stream() {
        let units = stream();
        let mut splitter = AccessUnitSplitter::new();

        let mut out = splitter.push(&units.concat());
        out.extend(splitter.finish());

        assert_eq!(out.len(), 3);
        for (unit, expected) in out.iter().zip(&units) {
            assert_eq!(&unit.data, expected);
        }
        assert!(out[0].is_idr);
        assert!(!out[1].is_idr);
        assert!(!out[2].is_idr);
    }

    #[test]
    fn test_split_byte_by_byte() {
        let units = stream();
        let bytes = units.concat();
        let mut splitter = AccessUnitSplitter::new();

        let mut out = Vec::new();
        for b in &bytes {
            out.extend(splitter.push(std::slice::from_ref(b)));
        }
        out.extend(splitter.finish());

        let data: Vec<Vec<u8>> = out.into_iter().map(|u| u.data).collect();
        assert_eq!(data, units);
    }

    #[test]
    fn test_three_byte_start_codes() {
        let first = [&[0, 0, 1, 0x09, 0xf0][..], &[0, 0, 1, 0x65, 0x88]].concat();
        let second = [&[0, 0, 1, 0x09, 0xf0][..], &[0, 0, 1, 0x41, 0x9a]].concat();

        let mut splitter = AccessUnitSplitter::new();
        let mut out = splitter.push(&[first.clone(), second.clone()].concat());
        out.extend(splitter.finish());

        assert_eq!(out.len(), 2);
        assert_eq!(out[0].data, first);
        assert_eq!(out[1].data, second);
        assert!(out[0].is_idr);
    }

    #[test]
    fn test_nal_types() {
        let data = stream().concat();
        let types: Vec<u8> = nal_types(&data).collect();
        assert_eq!(types, vec![9, 7, 8, 5, 9, 1, 9, 1]);
    }

    #[test]
    fn test_empty_finish() {
        assert!(AccessUnitSplitter::new().finish().is_none());
    }
}
