use std::collections::HashMap;
use crate::core::error::{Error, Result};
use crate::storage::io::SeekableInput;

/// How a document's token ids are laid out in the tokens file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokensCodecType {
    ValuePerToken,
    AllTokensTheSame,
    RunLengthEncoding,
}

impl TokensCodecType {
    pub fn code(&self) -> u8 {
        match self {
            TokensCodecType::ValuePerToken => 1,
            TokensCodecType::AllTokensTheSame => 2,
            TokensCodecType::RunLengthEncoding => 3,
        }
    }

    pub fn from_code(code: u8) -> Result<Self> {
        match code {
            1 => Ok(TokensCodecType::ValuePerToken),
            2 => Ok(TokensCodecType::AllTokensTheSame),
            3 => Ok(TokensCodecType::RunLengthEncoding),
            _ => Err(Error::invalid_index(format!("unknown tokens codec {}", code))),
        }
    }
}

/// Width of one stored token value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenValueType {
    Byte,
    Short,
    ThreeBytes,
    Int,
}

const THREE_BYTES_MIN: i32 = -(1 << 23);
const THREE_BYTES_MAX: i32 = (1 << 23) - 1;

impl TokenValueType {
    pub fn code(&self) -> u8 {
        match self {
            TokenValueType::Byte => 0,
            TokenValueType::Short => 1,
            TokenValueType::ThreeBytes => 2,
            TokenValueType::Int => 3,
        }
    }

    pub fn from_code(code: u8) -> Result<Self> {
        match code {
            0 => Ok(TokenValueType::Byte),
            1 => Ok(TokenValueType::Short),
            2 => Ok(TokenValueType::ThreeBytes),
            3 => Ok(TokenValueType::Int),
            _ => Err(Error::invalid_index(format!("unknown token value type {}", code))),
        }
    }

    /// Smallest type that holds every value in [min, max]
    pub fn choose(min: i32, max: i32) -> Self {
        if min >= i8::MIN as i32 && max <= i8::MAX as i32 {
            TokenValueType::Byte
        } else if min >= i16::MIN as i32 && max <= i16::MAX as i32 {
            TokenValueType::Short
        } else if min >= THREE_BYTES_MIN && max <= THREE_BYTES_MAX {
            TokenValueType::ThreeBytes
        } else {
            TokenValueType::Int
        }
    }

    pub fn size_bytes(&self) -> usize {
        match self {
            TokenValueType::Byte => 1,
            TokenValueType::Short => 2,
            TokenValueType::ThreeBytes => 3,
            TokenValueType::Int => 4,
        }
    }

    pub fn min_value(&self) -> i32 {
        match self {
            TokenValueType::Byte => i8::MIN as i32,
            TokenValueType::Short => i16::MIN as i32,
            TokenValueType::ThreeBytes => THREE_BYTES_MIN,
            TokenValueType::Int => i32::MIN,
        }
    }

    pub fn write(&self, value: i32, out: &mut Vec<u8>) {
        match self {
            TokenValueType::Byte => out.push(value as i8 as u8),
            TokenValueType::Short => out.extend_from_slice(&(value as i16).to_le_bytes()),
            TokenValueType::ThreeBytes => out.extend_from_slice(&value.to_le_bytes()[..3]),
            TokenValueType::Int => out.extend_from_slice(&value.to_le_bytes()),
        }
    }

    pub fn read<I: SeekableInput + ?Sized>(&self, input: &mut I) -> Result<i32> {
        Ok(match self {
            TokenValueType::Byte => input.read_byte()? as i8 as i32,
            TokenValueType::Short => input.read_i16()? as i32,
            TokenValueType::ThreeBytes => {
                let mut b = [0u8; 4];
                input.read_exact_bytes(&mut b[..3])?;
                // sign-extend from 24 bits
                (i32::from_le_bytes(b) << 8) >> 8
            }
            TokenValueType::Int => input.read_i32()?,
        })
    }
}

/// Codec for one document's tokens, chosen per document and recorded in
/// the tokens index as (codec code, parameter byte).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokensCodec {
    pub codec_type: TokensCodecType,
    pub value_type: TokenValueType,
    pub rle_block_size: i16,
}

impl TokensCodec {
    pub fn from_header(codec: u8, parameter: u8) -> Result<Self> {
        let codec_type = TokensCodecType::from_code(codec)?;
        let value_type = match codec_type {
            TokensCodecType::AllTokensTheSame => TokenValueType::Int,
            _ => TokenValueType::from_code(parameter)?,
        };
        // Block size of RLE docs is stored in the doc itself
        Ok(TokensCodec { codec_type, value_type, rle_block_size: 0 })
    }

    /// Pick the cheapest codec for these tokens.
    /// Run-length encoding only when it needs fewer than half the values.
    pub fn choose(tokens: &[i32], rle_block_size: i16) -> Self {
        let mut min = 0;
        let mut max = 0;
        let mut all_the_same = !tokens.is_empty();
        let mut last: Option<i32> = None;
        let mut rle_values = 0usize;
        let mut run_length = 0usize;
        for &token in tokens {
            min = min.min(token);
            max = max.max(token);
            if last == Some(token) {
                run_length += 1;
            } else {
                all_the_same = all_the_same && last.is_none();
                rle_values += 1;
                if run_length > 1 {
                    rle_values += 1;
                }
                run_length = 1;
            }
            last = Some(token);
        }
        if run_length > 1 {
            rle_values += 1;
        }

        let codec_type = if all_the_same {
            TokensCodecType::AllTokensTheSame
        } else if rle_values < tokens.len() / 2 {
            TokensCodecType::RunLengthEncoding
        } else {
            TokensCodecType::ValuePerToken
        };
        let value_type = match codec_type {
            TokensCodecType::AllTokensTheSame => TokenValueType::Int,
            _ => TokenValueType::choose(min, max),
        };
        TokensCodec { codec_type, value_type, rle_block_size }
    }

    pub fn parameter(&self) -> u8 {
        match self.codec_type {
            TokensCodecType::AllTokensTheSame => 0,
            _ => self.value_type.code(),
        }
    }

    pub fn encode(&self, tokens: &[i32], out: &mut Vec<u8>) -> Result<()> {
        match self.codec_type {
            TokensCodecType::ValuePerToken => {
                for &token in tokens {
                    self.value_type.write(token, out);
                }
            }
            TokensCodecType::AllTokensTheSame => {
                let first = tokens
                    .first()
                    .ok_or_else(|| Error::invalid_argument("all-the-same codec needs at least one token"))?;
                out.extend_from_slice(&first.to_le_bytes());
            }
            TokensCodecType::RunLengthEncoding => self.encode_rle(tokens, out)?,
        }
        Ok(())
    }

    // [ i16 block size ][ i32 number of blocks ][ i32 end offset per block ][ block data ... ]
    fn encode_rle(&self, tokens: &[i32], out: &mut Vec<u8>) -> Result<()> {
        let block_size = self.rle_block_size;
        if block_size <= 0 {
            return Err(Error::invalid_argument("run-length block size must be positive"));
        }
        let blocks: Vec<Vec<i32>> = tokens
            .chunks(block_size as usize)
            .map(|chunk| self.runs_in_block(chunk))
            .collect();

        out.extend_from_slice(&block_size.to_le_bytes());
        out.extend_from_slice(&(blocks.len() as i32).to_le_bytes());
        let mut end_offset = 0i32;
        for block in &blocks {
            end_offset += (block.len() * self.value_type.size_bytes()) as i32;
            out.extend_from_slice(&end_offset.to_le_bytes());
        }
        for block in &blocks {
            for &value in block {
                self.value_type.write(value, out);
            }
        }
        Ok(())
    }

    /// A run of N > 1 equal tokens becomes [-N, token]. Runs are capped so -N
    /// still fits the value type.
    fn runs_in_block(&self, chunk: &[i32]) -> Vec<i32> {
        let max_run = (-(self.value_type.min_value() as i64)) as usize;
        let mut values = Vec::with_capacity(chunk.len());
        let mut last: Option<i32> = None;
        let mut run = 0usize;
        for &token in chunk {
            if last == Some(token) && run < max_run {
                run += 1;
                continue;
            }
            if let Some(prev) = last {
                push_run(&mut values, prev, run);
            }
            last = Some(token);
            run = 1;
        }
        if let Some(prev) = last {
            push_run(&mut values, prev, run);
        }
        values
    }

    /// Read several [start, end) ranges of one document's tokens.
    /// Ranges must already be validated against the document length.
    pub fn read_snippets<I: SeekableInput + ?Sized>(
        &self,
        input: &mut I,
        doc_offset: u64,
        starts: &[i32],
        ends: &[i32],
    ) -> Result<Vec<Vec<i32>>> {
        if starts.len() != ends.len() {
            return Err(Error::invalid_argument("starts and ends must have equal length"));
        }
        match self.codec_type {
            TokensCodecType::ValuePerToken => {
                let width = self.value_type.size_bytes() as u64;
                let mut snippets = Vec::with_capacity(starts.len());
                for (&start, &end) in starts.iter().zip(ends) {
                    input.seek_to(doc_offset + start as u64 * width)?;
                    let mut snippet = Vec::with_capacity((end - start) as usize);
                    for _ in start..end {
                        snippet.push(self.value_type.read(input)?);
                    }
                    snippets.push(snippet);
                }
                Ok(snippets)
            }
            TokensCodecType::AllTokensTheSame => {
                input.seek_to(doc_offset)?;
                let value = input.read_i32()?;
                Ok(starts
                    .iter()
                    .zip(ends)
                    .map(|(&start, &end)| vec![value; (end - start) as usize])
                    .collect())
            }
            TokensCodecType::RunLengthEncoding => {
                let mut doc = RleDoc::open(input, doc_offset, self.value_type)?;
                starts
                    .iter()
                    .zip(ends)
                    .map(|(&start, &end)| doc.read_snippet(start, end))
                    .collect()
            }
        }
    }
}

fn push_run(values: &mut Vec<i32>, token: i32, run: usize) {
    if run > 1 {
        values.push(-(run as i32));
    }
    values.push(token);
}

/// One run-length encoded document; decoded blocks are kept for the
/// duration of a batched read.
struct RleDoc<'a, I: SeekableInput + ?Sized> {
    input: &'a mut I,
    value_type: TokenValueType,
    block_size: i32,
    block_ends: Vec<i32>,
    data_start: u64,
    decoded: HashMap<usize, Vec<i32>>,
}

impl<'a, I: SeekableInput + ?Sized> RleDoc<'a, I> {
    fn open(input: &'a mut I, doc_offset: u64, value_type: TokenValueType) -> Result<Self> {
        input.seek_to(doc_offset)?;
        let block_size = input.read_i16()? as i32;
        let number_of_blocks = input.read_i32()?;
        if block_size <= 0 || number_of_blocks < 0 {
            return Err(Error::invalid_index(format!(
                "bad run-length header (block size {}, blocks {})",
                block_size, number_of_blocks
            )));
        }
        let mut block_ends = Vec::with_capacity(number_of_blocks as usize);
        for _ in 0..number_of_blocks {
            block_ends.push(input.read_i32()?);
        }
        let data_start = doc_offset + 2 + 4 + 4 * number_of_blocks as u64;
        Ok(RleDoc {
            input,
            value_type,
            block_size,
            block_ends,
            data_start,
            decoded: HashMap::new(),
        })
    }

    fn read_snippet(&mut self, start: i32, end: i32) -> Result<Vec<i32>> {
        let mut snippet = Vec::with_capacity((end - start).max(0) as usize);
        let mut position = start;
        while position < end {
            let block_number = (position / self.block_size) as usize;
            let index_in_block = (position % self.block_size) as usize;
            let block = self.block(block_number)?;
            if index_in_block >= block.len() {
                return Err(Error::invalid_index(format!(
                    "index in block {} beyond decoded block size {}",
                    index_in_block,
                    block.len()
                )));
            }
            let take = (block.len() - index_in_block).min((end - position) as usize);
            snippet.extend_from_slice(&block[index_in_block..index_in_block + take]);
            position += take as i32;
        }
        Ok(snippet)
    }

    fn block(&mut self, block_number: usize) -> Result<&Vec<i32>> {
        if block_number >= self.block_ends.len() {
            return Err(Error::invalid_index("trying to read past end of document"));
        }
        if !self.decoded.contains_key(&block_number) {
            let block_start = if block_number == 0 { 0 } else { self.block_ends[block_number - 1] };
            let block_end = self.block_ends[block_number];
            let width = self.value_type.size_bytes() as i32;
            self.input.seek_to(self.data_start + block_start as u64)?;
            let mut tokens = Vec::with_capacity(self.block_size as usize);
            let mut consumed = 0;
            while consumed < block_end - block_start {
                let value = self.value_type.read(&mut *self.input)?;
                consumed += width;
                if value <= -2 {
                    let token = self.value_type.read(&mut *self.input)?;
                    consumed += width;
                    tokens.extend(std::iter::repeat_n(token, (-value) as usize));
                } else {
                    tokens.push(value);
                }
            }
            self.decoded.insert(block_number, tokens);
        }
        self.decoded
            .get(&block_number)
            .ok_or_else(|| Error::invalid_index("block decode failed"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::io::SliceInput;

    fn roundtrip(tokens: &[i32], codec: TokensCodec) -> Vec<i32> {
        let mut bytes = Vec::new();
        codec.encode(tokens, &mut bytes).unwrap();
        let mut input = SliceInput::new(&bytes);
        let reader = TokensCodec::from_header(codec.codec_type.code(), codec.parameter()).unwrap();
        reader
            .read_snippets(&mut input, 0, &[0], &[tokens.len() as i32])
            .unwrap()
            .remove(0)
    }

    #[test]
    fn chooses_all_the_same() {
        let codec = TokensCodec::choose(&[7, 7, 7, 7], 100);
        assert_eq!(codec.codec_type, TokensCodecType::AllTokensTheSame);
        assert_eq!(roundtrip(&[7, 7, 7, 7], codec), vec![7, 7, 7, 7]);
    }

    #[test]
    fn chooses_run_length_for_long_runs() {
        let mut tokens = vec![3; 50];
        tokens.extend(vec![-1; 50]);
        tokens.extend(vec![4; 30]);
        let codec = TokensCodec::choose(&tokens, 16);
        assert_eq!(codec.codec_type, TokensCodecType::RunLengthEncoding);
        assert_eq!(codec.value_type, TokenValueType::Byte);
        assert_eq!(roundtrip(&tokens, codec), tokens);
    }

    #[test]
    fn run_length_respects_value_type_limit() {
        // 300 equal byte tokens need three runs (128, 128, 44) within one block
        let tokens = vec![5; 300];
        let codec = TokensCodec {
            codec_type: TokensCodecType::RunLengthEncoding,
            value_type: TokenValueType::Byte,
            rle_block_size: 1000,
        };
        assert_eq!(codec.runs_in_block(&tokens), vec![-128, 5, -128, 5, -44, 5]);
        assert_eq!(roundtrip(&tokens, codec), tokens);
    }

    #[test]
    fn value_per_token_picks_width() {
        let tokens = vec![1, 40000, 2, -1, 3];
        let codec = TokensCodec::choose(&tokens, 100);
        assert_eq!(codec.codec_type, TokensCodecType::ValuePerToken);
        assert_eq!(codec.value_type, TokenValueType::ThreeBytes);
        assert_eq!(roundtrip(&tokens, codec), tokens);
    }

    #[test]
    fn rle_snippets_cross_block_boundaries() {
        let tokens: Vec<i32> = (0..57).map(|i| i / 5).collect();
        let codec = TokensCodec {
            codec_type: TokensCodecType::RunLengthEncoding,
            value_type: TokenValueType::Byte,
            rle_block_size: 8,
        };
        let mut bytes = Vec::new();
        codec.encode(&tokens, &mut bytes).unwrap();
        let mut input = SliceInput::new(&bytes);
        let snippets = codec
            .read_snippets(&mut input, 0, &[0, 6, 15, 56], &[3, 19, 15, 57])
            .unwrap();
        assert_eq!(snippets[0], tokens[0..3].to_vec());
        assert_eq!(snippets[1], tokens[6..19].to_vec());
        assert!(snippets[2].is_empty());
        assert_eq!(snippets[3], vec![tokens[56]]);
    }
}
