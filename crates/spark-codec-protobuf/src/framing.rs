//! 长度前缀分帧。
//!
//! # 教案式说明
//! - **意图 (Why)**：在同一条同步流上连续写出多个值，读端能逐个切分而无需额外的外层协议；
//! - **契约 (What)**：
//!   - [`PrefixStyle::Base128`]：`field_number > 0` 时先写 `(field_number, LengthDelimited)` 标签，
//!     再写 varint 长度；否则只写 varint 长度；
//!   - [`PrefixStyle::Fixed32`]/[`PrefixStyle::Fixed32BigEndian`]：4 字节小端/大端长度；
//!   - [`PrefixStyle::None`]：不加前缀，值占据流的剩余全部字节，只能作为最后一项；
//!   - 非消息根值（标量、枚举、集合）按字段 1 包装消息写出，保证每一帧结构上都是消息；
//!   - 读端在前缀起始处读到 0 字节视为干净结束；前缀读到一半或负载不足为
//!     [`ProtoError::TruncatedMessage`]；字段号不匹配时按 8192 字节分块跳过负载并报告
//!     [`FrameOutcome::Skipped`]，这不是错误；
//! - **执行逻辑 (How)**：写端经 [`StreamSink`] 缓冲且 `leave_open`，调用结束后流仍归调用方；
//!   读端逐字节读取前缀，再把整帧负载读入内存后交给读游标解析。

use std::io::{self, Read, Write};
use std::sync::Arc;

use tracing::trace;

use crate::codec::wrapper::{wrap_reader, wrap_writer};
use crate::codec::{ProtoReader, ProtoWriter};
use crate::error::{ProtoError, Result};
use crate::options::CodecOptions;
use crate::reader::ReaderContext;
use crate::wire::{MAX_VARINT32_BYTES, WireType, tag_field_number};
use crate::writer::{StreamSink, WriterContext};

/// 跳过不匹配帧时每次读取的块大小。
pub const SKIP_CHUNK_SIZE: usize = 8192;

/// 长度前缀格式。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum PrefixStyle {
    /// 不加前缀，值延伸到流末尾。
    None,
    /// varint 长度，可选前置字段标签。
    #[default]
    Base128,
    /// 4 字节小端长度。
    Fixed32,
    /// 4 字节大端长度。
    Fixed32BigEndian,
}

/// 单次读帧的结果。
#[derive(Debug, PartialEq, Eq)]
pub enum FrameOutcome<T> {
    /// 成功解析出一个值。
    Item(T),
    /// 字段号不匹配，负载已被跳过。
    Skipped {
        /// 帧上实际携带的字段号。
        field_number: u32,
    },
    /// 流在帧边界处干净结束。
    End,
}

/// 以长度前缀写出一个值。
///
/// `options.buffer_size` 决定内部写缓冲大小；`PrefixStyle::None` 时直接写出根值。
pub fn write_length_prefixed<T, W>(
    destination: &mut W,
    value: &T,
    writer: Arc<dyn ProtoWriter<T>>,
    style: PrefixStyle,
    field_number: u32,
    options: &CodecOptions,
) -> Result<()>
where
    T: Send + Sync + 'static,
    W: Write,
{
    let mut sink = StreamSink::with_capacity(destination, options.buffer_size, true);
    {
        let mut ctx = WriterContext::new(&mut sink);
        if style == PrefixStyle::None {
            writer.write_to(&mut ctx, value)?;
        } else {
            let framed = wrap_writer(writer);
            let length = framed.calculate_size(value);
            write_prefix(&mut ctx, style, field_number, length)?;
            framed.write_to(&mut ctx, value)?;
        }
    }
    sink.dispose().map(|_| ())
}

fn write_prefix(
    ctx: &mut WriterContext<'_>,
    style: PrefixStyle,
    field_number: u32,
    length: usize,
) -> Result<()> {
    let length32 = u32::try_from(length).map_err(|_| ProtoError::ValueOutOfRange {
        value: length as i128,
        type_name: "frame length",
    })?;
    match style {
        PrefixStyle::None => Ok(()),
        PrefixStyle::Base128 => {
            if field_number > 0 {
                ctx.write_field_tag(field_number, WireType::LengthDelimited)?;
            }
            ctx.write_raw_varint32(length32)
        }
        PrefixStyle::Fixed32 => ctx.write_raw_little_endian32(length32),
        PrefixStyle::Fixed32BigEndian => ctx.write_fixed32_big_endian(length32),
    }
}

/// 从流中读取一帧。
///
/// `field_number` 仅对 `Base128` 生效：大于 0 时帧标签上的字段号必须与之相等，否则跳过该帧。
pub fn read_length_prefixed<T, R>(
    source: &mut R,
    reader: Arc<dyn ProtoReader<T>>,
    style: PrefixStyle,
    field_number: u32,
    options: &CodecOptions,
) -> Result<FrameOutcome<T>>
where
    T: Send + Sync + 'static,
    R: Read,
{
    let length = match style {
        PrefixStyle::None => {
            let mut payload = Vec::new();
            source
                .read_to_end(&mut payload)
                .map_err(ProtoError::from_stream_read)?;
            let mut ctx = ReaderContext::with_options(&payload, options)?;
            return reader.parse_root(&mut ctx).map(FrameOutcome::Item);
        }
        PrefixStyle::Base128 => {
            let mut actual_field = None;
            if field_number > 0 {
                let Some(tag) = read_varint32(source)? else {
                    return Ok(FrameOutcome::End);
                };
                actual_field = Some(tag_field_number(tag));
            }
            let Some(length) = read_varint32(source)? else {
                // 标签已读出，长度缺失即前缀被截断。
                return match actual_field {
                    Some(_) => Err(ProtoError::TruncatedMessage),
                    None => Ok(FrameOutcome::End),
                };
            };
            if let Some(actual) = actual_field.filter(|actual| *actual != field_number) {
                skip_payload(source, length as usize)?;
                trace!(
                    expected = field_number,
                    actual,
                    length,
                    "length-prefixed frame skipped"
                );
                return Ok(FrameOutcome::Skipped {
                    field_number: actual,
                });
            }
            length
        }
        PrefixStyle::Fixed32 => match read_fixed32(source)? {
            Some(raw) => u32::from_le_bytes(raw),
            None => return Ok(FrameOutcome::End),
        },
        PrefixStyle::Fixed32BigEndian => match read_fixed32(source)? {
            Some(raw) => u32::from_be_bytes(raw),
            None => return Ok(FrameOutcome::End),
        },
    };

    let length = length as usize;
    if length > options.size_limit {
        return Err(ProtoError::SizeLimitExceeded {
            size: length,
            limit: options.size_limit,
        });
    }
    let payload = read_payload(source, length)?;
    let mut ctx = ReaderContext::with_options(&payload, options)?;
    wrap_reader(reader).parse_from(&mut ctx).map(FrameOutcome::Item)
}

/// 读取一个字节；流结束返回 `None`。
fn read_byte<R: Read>(source: &mut R) -> Result<Option<u8>> {
    let mut byte = [0u8; 1];
    loop {
        match source.read(&mut byte) {
            Ok(0) => return Ok(None),
            Ok(_) => return Ok(Some(byte[0])),
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(ProtoError::Io(err)),
        }
    }
}

/// 读取至多 5 字节的 varint；首字节即遇流末尾返回 `None`。
fn read_varint32<R: Read>(source: &mut R) -> Result<Option<u32>> {
    let mut result = 0u32;
    for index in 0..MAX_VARINT32_BYTES {
        let Some(byte) = read_byte(source)? else {
            if index == 0 {
                return Ok(None);
            }
            return Err(ProtoError::TruncatedMessage);
        };
        result |= u32::from(byte & 0x7F) << (7 * index);
        if byte & 0x80 == 0 {
            return Ok(Some(result));
        }
    }
    Err(ProtoError::MalformedVarint)
}

/// 读取 4 字节定长前缀；一个字节都读不到时返回 `None`。
fn read_fixed32<R: Read>(source: &mut R) -> Result<Option<[u8; 4]>> {
    let mut raw = [0u8; 4];
    let mut filled = 0;
    while filled < raw.len() {
        match source.read(&mut raw[filled..]) {
            Ok(0) if filled == 0 => return Ok(None),
            Ok(0) => return Err(ProtoError::TruncatedMessage),
            Ok(read) => filled += read,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
            Err(err) => return Err(ProtoError::Io(err)),
        }
    }
    Ok(Some(raw))
}

fn read_payload<R: Read>(source: &mut R, length: usize) -> Result<Vec<u8>> {
    let mut payload = Vec::with_capacity(length.min(SKIP_CHUNK_SIZE));
    source
        .take(length as u64)
        .read_to_end(&mut payload)
        .map_err(ProtoError::from_stream_read)?;
    if payload.len() < length {
        return Err(ProtoError::TruncatedMessage);
    }
    Ok(payload)
}

fn skip_payload<R: Read>(source: &mut R, length: usize) -> Result<()> {
    let mut chunk = [0u8; SKIP_CHUNK_SIZE];
    let mut left = length;
    while left > 0 {
        let wanted = left.min(chunk.len());
        match source.read(&mut chunk[..wanted]) {
            Ok(0) => return Err(ProtoError::TruncatedMessage),
            Ok(read) => left -= read,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
            Err(err) => return Err(ProtoError::Io(err)),
        }
    }
    Ok(())
}

/// 逐帧读取的迭代器。
///
/// 不匹配的帧被静默跳过；遇到错误时产出该错误并终止。`PrefixStyle::None` 只产出一项。
pub struct DeserializeItems<T, R> {
    source: R,
    reader: Arc<dyn ProtoReader<T>>,
    style: PrefixStyle,
    field_number: u32,
    options: CodecOptions,
    finished: bool,
}

impl<T, R> DeserializeItems<T, R> {
    /// 以显式解码器构造。
    pub fn new(
        source: R,
        reader: Arc<dyn ProtoReader<T>>,
        style: PrefixStyle,
        field_number: u32,
        options: CodecOptions,
    ) -> Self {
        Self {
            source,
            reader,
            style,
            field_number,
            options,
            finished: false,
        }
    }

    /// 取回底层流。
    pub fn into_inner(self) -> R {
        self.source
    }
}

impl<T: Send + Sync + 'static, R: Read> Iterator for DeserializeItems<T, R> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Result<T>> {
        while !self.finished {
            let outcome = read_length_prefixed(
                &mut self.source,
                self.reader.clone(),
                self.style,
                self.field_number,
                &self.options,
            );
            match outcome {
                Ok(FrameOutcome::Item(item)) => {
                    self.finished = self.style == PrefixStyle::None;
                    return Some(Ok(item));
                }
                Ok(FrameOutcome::Skipped { .. }) => continue,
                Ok(FrameOutcome::End) => self.finished = true,
                Err(err) => {
                    self.finished = true;
                    return Some(Err(err));
                }
            }
        }
        None
    }
}

impl<T, R> std::fmt::Debug for DeserializeItems<T, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeserializeItems")
            .field("style", &self.style)
            .field("field_number", &self.field_number)
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}
