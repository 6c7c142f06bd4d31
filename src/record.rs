use crate::error::{FormatError, Result};

pub const RECORD_SIZE: usize = 28;
pub const CODE_LEN: usize = 4;

pub const TIME_OFFSET: usize = 0;
pub const BID_OFFSET: usize = 4;
pub const ASK_OFFSET: usize = 8;
pub const VOL_BID_OFFSET: usize = 12;
pub const VOL_ASK_OFFSET: usize = 16;
pub const MODE_OFFSET: usize = 20;
pub const CORR_OFFSET: usize = 22;
pub const CODE_OFFSET: usize = 24;

pub const TRADES_TAG: [u8; 10] = *b"TAS_TRADES";
pub const QUOTES_TAG: [u8; 10] = *b"TAS_QUOTES";

/// Which interpretation applies to every record in a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    Trades,
    Quotes,
}

impl RecordKind {
    pub fn tag(&self) -> [u8; 10] {
        match self {
            RecordKind::Trades => TRADES_TAG,
            RecordKind::Quotes => QUOTES_TAG,
        }
    }

    pub fn from_tag(tag: &[u8; 10]) -> Option<Self> {
        match *tag {
            TRADES_TAG => Some(RecordKind::Trades),
            QUOTES_TAG => Some(RecordKind::Quotes),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            RecordKind::Trades => "trades",
            RecordKind::Quotes => "quotes",
        }
    }
}

/// One tick. Trades and quotes share the layout:
/// for trades `bid == ask` holds the price and `vol_bid == vol_ask` the volume,
/// `mode_or_g127` is the rule g127 code and `mmid_or_cond` the trade condition.
/// For quotes `mode_or_g127` is the quote mode and `mmid_or_cond` the market maker id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Record {
    /// Seconds since midnight.
    pub time: i32,
    pub bid: i32,
    pub ask: i32,
    pub vol_bid: i32,
    pub vol_ask: i32,
    pub mode_or_g127: i16,
    pub corr: i16,
    pub mmid_or_cond: [u8; CODE_LEN],
}

impl Record {
    pub fn trade(time: i32, price: i32, volume: i32, g127: i16, corr: i16, cond: &str) -> Self {
        Self {
            time,
            bid: price,
            ask: price,
            vol_bid: volume,
            vol_ask: volume,
            mode_or_g127: g127,
            corr,
            mmid_or_cond: code_bytes(cond),
        }
    }

    pub fn quote(
        time: i32,
        bid: i32,
        ask: i32,
        vol_bid: i32,
        vol_ask: i32,
        mode: i16,
        mmid: &str,
    ) -> Self {
        Self {
            time,
            bid,
            ask,
            vol_bid,
            vol_ask,
            mode_or_g127: mode,
            corr: 0,
            mmid_or_cond: code_bytes(mmid),
        }
    }

    /// Trade price; for quote records this is the ask.
    pub fn price(&self) -> i32 {
        self.ask
    }

    /// Trade volume; for quote records this is the ask volume.
    pub fn volume(&self) -> i32 {
        self.vol_ask
    }

    /// `mmid_or_cond` without trailing NUL or space padding.
    pub fn code_str(&self) -> String {
        let end = self
            .mmid_or_cond
            .iter()
            .rposition(|&b| b != 0 && b != b' ')
            .map_or(0, |pos| pos + 1);
        String::from_utf8_lossy(&self.mmid_or_cond[..end]).into_owned()
    }

    pub fn to_bytes(&self) -> [u8; RECORD_SIZE] {
        let mut buf = [0u8; RECORD_SIZE];
        buf[TIME_OFFSET..TIME_OFFSET + 4].copy_from_slice(&self.time.to_le_bytes());
        buf[BID_OFFSET..BID_OFFSET + 4].copy_from_slice(&self.bid.to_le_bytes());
        buf[ASK_OFFSET..ASK_OFFSET + 4].copy_from_slice(&self.ask.to_le_bytes());
        buf[VOL_BID_OFFSET..VOL_BID_OFFSET + 4].copy_from_slice(&self.vol_bid.to_le_bytes());
        buf[VOL_ASK_OFFSET..VOL_ASK_OFFSET + 4].copy_from_slice(&self.vol_ask.to_le_bytes());
        buf[MODE_OFFSET..MODE_OFFSET + 2].copy_from_slice(&self.mode_or_g127.to_le_bytes());
        buf[CORR_OFFSET..CORR_OFFSET + 2].copy_from_slice(&self.corr.to_le_bytes());
        buf[CODE_OFFSET..CODE_OFFSET + CODE_LEN].copy_from_slice(&self.mmid_or_cond);
        buf
    }

    pub fn from_bytes(bytes: &[u8; RECORD_SIZE]) -> Self {
        let i32_at = |offset: usize| {
            i32::from_le_bytes([
                bytes[offset],
                bytes[offset + 1],
                bytes[offset + 2],
                bytes[offset + 3],
            ])
        };
        let i16_at = |offset: usize| i16::from_le_bytes([bytes[offset], bytes[offset + 1]]);
        let mut mmid_or_cond = [0u8; CODE_LEN];
        mmid_or_cond.copy_from_slice(&bytes[CODE_OFFSET..CODE_OFFSET + CODE_LEN]);
        Self {
            time: i32_at(TIME_OFFSET),
            bid: i32_at(BID_OFFSET),
            ask: i32_at(ASK_OFFSET),
            vol_bid: i32_at(VOL_BID_OFFSET),
            vol_ask: i32_at(VOL_ASK_OFFSET),
            mode_or_g127: i16_at(MODE_OFFSET),
            corr: i16_at(CORR_OFFSET),
            mmid_or_cond,
        }
    }
}

pub fn encode_records(records: &[Record]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(records.len() * RECORD_SIZE);
    for record in records {
        buf.extend_from_slice(&record.to_bytes());
    }
    buf
}

pub fn decode_records(bytes: &[u8]) -> Result<Vec<Record>> {
    if bytes.len() % RECORD_SIZE != 0 {
        return Err(FormatError::RecordMisalignment {
            len: bytes.len() as u64,
        });
    }
    Ok(bytes
        .chunks_exact(RECORD_SIZE)
        .map(|chunk| Record::from_bytes(chunk.try_into().expect("chunk length")))
        .collect())
}

/// Truncates or NUL-pads `code` into the fixed code field.
fn code_bytes(code: &str) -> [u8; CODE_LEN] {
    let mut buf = [0u8; CODE_LEN];
    let len = code.len().min(CODE_LEN);
    buf[..len].copy_from_slice(&code.as_bytes()[..len]);
    buf
}
