use log::{ debug, warn };
use serde::de::DeserializeOwned;
use std::marker::PhantomData;

/// Scanning cursor for one decode operation. `depth` counts unbalanced `{`
/// outside string literals; `in_string`/`escape_next` keep quotes and
/// backslash escapes from desynchronizing the brace count; `object_start` is
/// the byte offset of the `{` that opened the object currently in flight.
#[derive(Debug, Default)]
struct ScanState {
    depth: u32,
    in_string: bool,
    escape_next: bool,
    object_start: Option<usize>,
}

/// Incremental decoder for a chunked response body carrying JSON objects,
/// either newline-separated or back-to-back. Network chunk boundaries are
/// arbitrary: they may fall inside a multi-byte UTF-8 sequence or in the
/// middle of an object, so the decoder carries undecoded byte tails and an
/// explicit scan state across `feed` calls.
///
/// Each complete top-level object is deserialized into `T` and handed to the
/// callback in arrival order. A fragment that fails to deserialize is logged
/// and skipped; it never aborts the stream.
pub struct ChunkDecoder<T> {
    buffer: String,
    scan_pos: usize,
    state: ScanState,
    utf8_carry: Vec<u8>,
    _chunk: PhantomData<T>,
}

impl<T: DeserializeOwned> ChunkDecoder<T> {
    pub fn new() -> Self {
        Self {
            buffer: String::new(),
            scan_pos: 0,
            state: ScanState::default(),
            utf8_carry: Vec::new(),
            _chunk: PhantomData,
        }
    }

    /// Appends one network chunk and emits every object it completes.
    pub fn feed<F: FnMut(T)>(&mut self, bytes: &[u8], mut emit: F) {
        self.decode_text(bytes);
        self.scan(&mut emit);
    }

    /// Signals end-of-stream. Any leftover non-whitespace content gets one
    /// last parse attempt; a partial trailing object is discarded silently.
    pub fn finish<F: FnMut(T)>(mut self, mut emit: F) {
        if !self.utf8_carry.is_empty() {
            let carry = std::mem::take(&mut self.utf8_carry);
            self.buffer.push_str(&String::from_utf8_lossy(&carry));
            self.scan(&mut emit);
        }

        let rest = self.buffer.trim();
        if rest.is_empty() {
            return;
        }
        if rest.starts_with('{') {
            match serde_json::from_str::<T>(rest) {
                Ok(chunk) => {
                    emit(chunk);
                    return;
                }
                Err(e) => debug!("Discarding trailing stream fragment: {}", e),
            }
        } else {
            debug!("Discarding {} bytes of trailing non-object stream data", rest.len());
        }
    }

    /// Decodes `bytes` onto the text buffer. An incomplete multi-byte
    /// sequence at the end of the input is held back for the next call;
    /// genuinely invalid bytes become U+FFFD.
    fn decode_text(&mut self, bytes: &[u8]) {
        if self.utf8_carry.is_empty() {
            self.decode_slice(bytes);
        } else {
            let mut joined = std::mem::take(&mut self.utf8_carry);
            joined.extend_from_slice(bytes);
            self.decode_slice(&joined);
        }
    }

    fn decode_slice(&mut self, mut input: &[u8]) {
        loop {
            match std::str::from_utf8(input) {
                Ok(text) => {
                    self.buffer.push_str(text);
                    return;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    // Everything below `valid` was just checked.
                    self.buffer.push_str(std::str::from_utf8(&input[..valid]).unwrap_or(""));
                    match e.error_len() {
                        Some(bad) => {
                            self.buffer.push('\u{FFFD}');
                            input = &input[valid + bad..];
                        }
                        None => {
                            self.utf8_carry = input[valid..].to_vec();
                            return;
                        }
                    }
                }
            }
        }
    }

    /// Resumes the brace-depth scan from where the last call stopped and
    /// drains every completed object off the front of the buffer.
    fn scan<F: FnMut(T)>(&mut self, emit: &mut F) {
        loop {
            let mut completed: Option<(usize, usize)> = None;

            for (i, c) in self.buffer[self.scan_pos..].char_indices() {
                let pos = self.scan_pos + i;
                if self.state.in_string {
                    if self.state.escape_next {
                        self.state.escape_next = false;
                    } else if c == '\\' {
                        self.state.escape_next = true;
                    } else if c == '"' {
                        self.state.in_string = false;
                    }
                    continue;
                }
                match c {
                    '"' if self.state.depth > 0 => {
                        self.state.in_string = true;
                    }
                    '{' => {
                        if self.state.depth == 0 {
                            self.state.object_start = Some(pos);
                        }
                        self.state.depth += 1;
                    }
                    '}' if self.state.depth > 0 => {
                        self.state.depth -= 1;
                        if self.state.depth == 0 {
                            let start = self.state.object_start.take().unwrap_or(pos);
                            completed = Some((start, pos + c.len_utf8()));
                            break;
                        }
                    }
                    // Anything between objects (delimiters, stray bytes) is
                    // skipped; brace counting never relies on separators.
                    _ => {}
                }
            }

            match completed {
                Some((start, end)) => {
                    match serde_json::from_str::<T>(&self.buffer[start..end]) {
                        Ok(chunk) => emit(chunk),
                        Err(e) => {
                            warn!(
                                "Skipping malformed stream fragment ({} bytes): {}",
                                end - start,
                                e
                            );
                        }
                    }
                    self.buffer.drain(..end);
                    self.scan_pos = 0;
                    self.state = ScanState::default();
                }
                None => {
                    self.scan_pos = self.buffer.len();
                    return;
                }
            }
        }
    }
}

impl<T: DeserializeOwned> Default for ChunkDecoder<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{ json, Value };

    fn decode_all(payload: &[u8], split_at: usize) -> Vec<Value> {
        let mut out = Vec::new();
        let mut decoder = ChunkDecoder::<Value>::new();
        let (head, tail) = payload.split_at(split_at);
        decoder.feed(head, |v| out.push(v));
        decoder.feed(tail, |v| out.push(v));
        decoder.finish(|v| out.push(v));
        out
    }

    #[test]
    fn emits_objects_regardless_of_split_offset() {
        // Escaped quotes, an escaped backslash, braces and a newline inside
        // string values, a multi-byte character, no delimiter between the
        // last two objects.
        let payload = concat!(
            "{\"response\": \"he said \\\"hi\\\"\", \"start_time\": \"1\"}\n",
            "{\"response\": \"a } b { c\\\\\", \"note\": \"line\\nbreak é\"}",
            "{\"response\": \"done\"}"
        )
        .as_bytes();
        let expected = vec![
            json!({"response": "he said \"hi\"", "start_time": "1"}),
            json!({"response": "a } b { c\\", "note": "line\nbreak é"}),
            json!({"response": "done"}),
        ];

        for split in 0..=payload.len() {
            let got = decode_all(payload, split);
            assert_eq!(got, expected, "mismatch at split offset {}", split);
        }
    }

    #[test]
    fn malformed_fragment_between_valid_objects_is_skipped() {
        let payload = b"{\"a\": 1}{\"b\": }{\"c\": 3}";
        let mut out = Vec::new();
        let mut decoder = ChunkDecoder::<Value>::new();
        decoder.feed(payload, |v| out.push(v));
        decoder.finish(|v| out.push(v));
        assert_eq!(out, vec![json!({"a": 1}), json!({"c": 3})]);
    }

    #[test]
    fn newline_delimited_and_back_to_back_decode_identically() {
        let delimited = b"{\"a\": 1}\n{\"b\": 2}\n";
        let packed = b"{\"a\": 1}{\"b\": 2}";
        let expected = vec![json!({"a": 1}), json!({"b": 2})];
        for payload in [&delimited[..], &packed[..]] {
            let mut out = Vec::new();
            let mut decoder = ChunkDecoder::<Value>::new();
            decoder.feed(payload, |v| out.push(v));
            decoder.finish(|v| out.push(v));
            assert_eq!(out, expected);
        }
    }

    #[test]
    fn partial_trailing_object_is_discarded_silently() {
        let mut out = Vec::new();
        let mut decoder = ChunkDecoder::<Value>::new();
        decoder.feed(b"{\"a\": 1}{\"b\": ", |v| out.push(v));
        decoder.finish(|v| out.push(v));
        assert_eq!(out, vec![json!({"a": 1})]);
    }

    #[test]
    fn multibyte_character_split_across_feeds_decodes_intact() {
        let payload = "{\"response\": \"café ☕\"}".as_bytes();
        // Split inside the three-byte ☕ sequence.
        let split = payload.iter().position(|&b| b == 0xE2).unwrap() + 1;
        let got = decode_all(payload, split);
        assert_eq!(got, vec![json!({"response": "café ☕"})]);
    }

    #[test]
    fn garbage_between_objects_is_ignored() {
        let payload = b"noise {\"a\": 1} , more noise\n{\"b\": 2} tail";
        let mut out = Vec::new();
        let mut decoder = ChunkDecoder::<Value>::new();
        decoder.feed(payload, |v| out.push(v));
        decoder.finish(|v| out.push(v));
        assert_eq!(out, vec![json!({"a": 1}), json!({"b": 2})]);
    }

    #[test]
    fn typed_decoding_skips_fragments_that_do_not_fit() {
        use crate::models::query::QueryResponseChunk;

        let payload =
            b"{\"response\": \"ok\"}{\"response\": 17}{\"response\": \"again\"}";
        let mut out: Vec<QueryResponseChunk> = Vec::new();
        let mut decoder = ChunkDecoder::<QueryResponseChunk>::new();
        decoder.feed(payload, |c| out.push(c));
        decoder.finish(|c| out.push(c));
        let fragments: Vec<&str> =
            out.iter().map(|c| c.response_fragment.as_str()).collect();
        assert_eq!(fragments, vec!["ok", "again"]);
    }

    #[test]
    fn empty_stream_emits_nothing() {
        let mut out = Vec::new();
        let mut decoder = ChunkDecoder::<Value>::new();
        decoder.feed(b"", |v| out.push(v));
        decoder.feed(b"  \n ", |v| out.push(v));
        decoder.finish(|v| out.push(v));
        assert!(out.is_empty());
    }
}
