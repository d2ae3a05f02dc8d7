use thiserror::Error;

/// Errors that abort the whole decode of one inbound packet (`spec.md` §7 tier 2).
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    #[error("packet truncated at offset {0}")]
    Truncated(usize),
    #[error("label length {0} exceeds 63 bytes")]
    LabelTooLong(usize),
    #[error("name exceeds 256 bytes or 128 labels")]
    NameTooLong,
    #[error("compression pointer at offset {0} targets offset {1}, which is not in [12, {0})")]
    BadPointer(usize, usize),
    #[error("advertised record count {0} exceeds the hard cap of {1}")]
    TooManyRecords(usize, usize),
    #[error("RDATA length is zero")]
    ZeroRdata,
    #[error("RDATA at offset {0} (length {1}) runs past the end of the packet")]
    RdataOverrun(usize, usize),
    #[error("decoded name did not end exactly at the declared RDATA boundary")]
    NameOverrunsRdata,
    #[error("{0} trailing bytes after the declared sections")]
    TrailingBytes(usize),
    #[error("every query and resource record was filtered out")]
    EmptyAfterFilter,
}

/// Errors that abort startup entirely (`spec.md` §7 tier 1).
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("no interfaces configured")]
    NoInterfaces,
    #[error("duplicate interface name {0:?}")]
    DuplicateInterface(String),
    #[error("interface {0:?} is not a valid filter name: {1}")]
    InvalidFilterName(String, String),
    #[error("interface {0:?} combines an allow list and a deny list for the same scope")]
    ConflictingFilterLists(String),
    #[error("a second global filter list was defined; only one of allow/deny is permitted")]
    DuplicateGlobalFilter,
    #[error("interface {0:?} is disabled for every address family and has no peers to bridge to")]
    DisabledOnEveryFamily(String),
    #[error("OS has no network interface named {0:?}: {1}")]
    InterfaceNotFound(String, #[source] std::io::Error),
    #[error("no address family has at least two enabled interfaces; nothing to bridge")]
    NothingToBridge,
    #[error("failed to read config file {0:?}: {1}")]
    Io(String, #[source] std::io::Error),
    #[error("failed to parse config file {0:?}: {1}")]
    Parse(String, #[source] serde_json::Error),
}
