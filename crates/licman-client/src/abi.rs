//! # Contract ABI Codec
//!
//! Minimal Solidity ABI encoding for the five license contract functions.
//! Only the types those functions use are supported: `uint256` (carried as
//! `u64`), `uint8`, `address`, `string`, and `uint256[]`.
//!
//! ## Contract Interface
//!
//! ```solidity
//! function getAllLicenseIds() external view returns (uint256[] memory);
//! function licenses(uint256) external view returns (
//!     uint256 licenseId, string companyName, string companyAddress,
//!     string documentIpfsHash, uint8 status, address submitter, address reviewer);
//! function adminAddress() external view returns (address);
//! function submitLicense(string companyName, string companyAddress, string documentIpfsHash) external;
//! function reviewLicense(uint256 licenseId, uint8 newStatus) external;
//! ```

use licman_core::{Address, ContentAddress, LicenseId, LicenseRecord, LicenseStatus};

/// Size of one ABI word.
const WORD: usize = 32;

/// keccak256("getAllLicenseIds()")[..4]
pub const GET_ALL_LICENSE_IDS: [u8; 4] = [0x78, 0x65, 0xda, 0x2a];
/// keccak256("licenses(uint256)")[..4]
pub const LICENSES: [u8; 4] = [0x33, 0x79, 0x08, 0x45];
/// keccak256("adminAddress()")[..4]
pub const ADMIN_ADDRESS: [u8; 4] = [0xfc, 0x6f, 0x94, 0x68];
/// keccak256("submitLicense(string,string,string)")[..4]
pub const SUBMIT_LICENSE: [u8; 4] = [0x1b, 0x2a, 0xd6, 0xf5];
/// keccak256("reviewLicense(uint256,uint8)")[..4]
pub const REVIEW_LICENSE: [u8; 4] = [0x1d, 0x8d, 0xee, 0x87];

/// ABI codec errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AbiError {
    #[error("return data truncated: need {needed} bytes at offset {offset}, have {available}")]
    Truncated {
        offset: usize,
        needed: usize,
        available: usize,
    },
    #[error("value at offset {offset} does not fit in 64 bits")]
    Overflow { offset: usize },
    #[error("non-zero padding in word at offset {offset}")]
    DirtyPadding { offset: usize },
    #[error("string at offset {offset} is not valid UTF-8")]
    InvalidUtf8 { offset: usize },
    #[error("invalid hex data: {0}")]
    InvalidHex(String),
    #[error("invalid field {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },
}

/// A single call argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token<'a> {
    Uint(u64),
    Address(Address),
    String(&'a str),
}

fn uint_word(value: u64) -> [u8; WORD] {
    let mut word = [0u8; WORD];
    word[WORD - 8..].copy_from_slice(&value.to_be_bytes());
    word
}

fn address_word(address: &Address) -> [u8; WORD] {
    let mut word = [0u8; WORD];
    word[WORD - 20..].copy_from_slice(address.as_bytes());
    word
}

/// Encode arguments as a head/tail tuple.
pub fn encode_arguments(tokens: &[Token<'_>]) -> Vec<u8> {
    let head_len = tokens.len() * WORD;
    let mut head = Vec::with_capacity(head_len);
    let mut tail = Vec::new();
    for token in tokens {
        match token {
            Token::Uint(v) => head.extend_from_slice(&uint_word(*v)),
            Token::Address(a) => head.extend_from_slice(&address_word(a)),
            Token::String(s) => {
                head.extend_from_slice(&uint_word((head_len + tail.len()) as u64));
                tail.extend_from_slice(&uint_word(s.len() as u64));
                tail.extend_from_slice(s.as_bytes());
                let padding = (WORD - s.len() % WORD) % WORD;
                tail.resize(tail.len() + padding, 0);
            }
        }
    }
    head.extend_from_slice(&tail);
    head
}

/// Selector followed by encoded arguments.
pub fn encode_call(selector: [u8; 4], tokens: &[Token<'_>]) -> Vec<u8> {
    let mut data = selector.to_vec();
    data.extend_from_slice(&encode_arguments(tokens));
    data
}

/// `0x`-prefixed lowercase hex.
pub fn to_hex(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// Decode `0x`-prefixed hex. `0x` alone is empty data.
pub fn from_hex(s: &str) -> Result<Vec<u8>, AbiError> {
    let digits = s
        .strip_prefix("0x")
        .ok_or_else(|| AbiError::InvalidHex(format!("missing 0x prefix: {s:?}")))?;
    hex::decode(digits).map_err(|e| AbiError::InvalidHex(e.to_string()))
}

/// Reader over contract return data.
#[derive(Debug, Clone, Copy)]
pub struct Decoder<'a> {
    data: &'a [u8],
}

impl<'a> Decoder<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    fn slice(&self, offset: usize, len: usize) -> Result<&'a [u8], AbiError> {
        let end = offset.checked_add(len).ok_or(AbiError::Overflow { offset })?;
        self.data.get(offset..end).ok_or(AbiError::Truncated {
            offset,
            needed: len,
            available: self.data.len(),
        })
    }

    fn uint_at(&self, offset: usize) -> Result<u64, AbiError> {
        let word = self.slice(offset, WORD)?;
        if word[..WORD - 8].iter().any(|b| *b != 0) {
            return Err(AbiError::Overflow { offset });
        }
        let mut tail = [0u8; 8];
        tail.copy_from_slice(&word[WORD - 8..]);
        Ok(u64::from_be_bytes(tail))
    }

    fn offset_at(&self, offset: usize) -> Result<usize, AbiError> {
        let value = self.uint_at(offset)?;
        usize::try_from(value).map_err(|_| AbiError::Overflow { offset })
    }

    /// `uint256` in head slot `index`.
    pub fn uint(&self, index: usize) -> Result<u64, AbiError> {
        self.uint_at(index * WORD)
    }

    /// `uint8` in head slot `index`.
    pub fn uint8(&self, index: usize) -> Result<u8, AbiError> {
        let offset = index * WORD;
        let value = self.uint_at(offset)?;
        u8::try_from(value).map_err(|_| AbiError::DirtyPadding { offset })
    }

    /// `address` in head slot `index`.
    pub fn address(&self, index: usize) -> Result<Address, AbiError> {
        let offset = index * WORD;
        let word = self.slice(offset, WORD)?;
        if word[..WORD - 20].iter().any(|b| *b != 0) {
            return Err(AbiError::DirtyPadding { offset });
        }
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&word[WORD - 20..]);
        Ok(Address::from_bytes(bytes))
    }

    /// Dynamic `string` referenced from head slot `index`.
    pub fn string(&self, index: usize) -> Result<String, AbiError> {
        let start = self.offset_at(index * WORD)?;
        let len = self.offset_at(start)?;
        let body_offset = start.checked_add(WORD).ok_or(AbiError::Overflow { offset: start })?;
        let body = self.slice(body_offset, len)?;
        String::from_utf8(body.to_vec()).map_err(|_| AbiError::InvalidUtf8 { offset: body_offset })
    }

    /// Dynamic `uint256[]` referenced from head slot `index`.
    pub fn uint_array(&self, index: usize) -> Result<Vec<u64>, AbiError> {
        let start = self.offset_at(index * WORD)?;
        let len = self.offset_at(start)?;
        // Check the whole body is present before allocating for it.
        let body_len = len.checked_mul(WORD).ok_or(AbiError::Overflow { offset: start })?;
        let body_offset = start.checked_add(WORD).ok_or(AbiError::Overflow { offset: start })?;
        self.slice(body_offset, body_len)?;
        (0..len).map(|i| self.uint_at(body_offset + i * WORD)).collect()
    }
}

/// Decode the return data of `getAllLicenseIds()`.
pub fn decode_license_ids(data: &[u8]) -> Result<Vec<LicenseId>, AbiError> {
    Ok(Decoder::new(data)
        .uint_array(0)?
        .into_iter()
        .map(LicenseId)
        .collect())
}

/// Decode the return data of `adminAddress()`.
pub fn decode_admin(data: &[u8]) -> Result<Address, AbiError> {
    Decoder::new(data).address(0)
}

/// Decode the return data of `licenses(uint256)`.
pub fn decode_license(data: &[u8]) -> Result<LicenseRecord, AbiError> {
    let d = Decoder::new(data);
    // The contract stores any string here; keep it as is.
    let document = ContentAddress::from_ledger(d.string(3)?);
    let status = LicenseStatus::from_code(d.uint8(4)?).map_err(|e| AbiError::InvalidField {
        field: "status",
        reason: e.to_string(),
    })?;
    Ok(LicenseRecord::from_ledger(
        LicenseId(d.uint(0)?),
        d.string(1)?,
        d.string(2)?,
        document,
        status,
        d.address(5)?,
        d.address(6)?,
    ))
}

/// Calldata for `licenses(uint256)`.
pub fn license_call(id: LicenseId) -> Vec<u8> {
    encode_call(LICENSES, &[Token::Uint(id.get())])
}

/// Calldata for `submitLicense(string,string,string)`.
pub fn submit_license_call(application: &licman_core::LicenseApplication) -> Vec<u8> {
    encode_call(
        SUBMIT_LICENSE,
        &[
            Token::String(&application.company_name),
            Token::String(&application.company_address),
            Token::String(application.document.as_str()),
        ],
    )
}

/// Calldata for `reviewLicense(uint256,uint8)`.
pub fn review_license_call(id: LicenseId, status: LicenseStatus) -> Vec<u8> {
    encode_call(
        REVIEW_LICENSE,
        &[Token::Uint(id.get()), Token::Uint(u64::from(status.code()))],
    )
}

/// Creation code: contract bytecode followed by the `constructor(address)`
/// argument.
pub fn deployment_code(bytecode: &[u8], admin: Address) -> Vec<u8> {
    let mut data = bytecode.to_vec();
    data.extend_from_slice(&encode_arguments(&[Token::Address(admin)]));
    data
}
