// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Define the closed parameter, optional-argument and return-shape vocabulary.
// Author: Lukas Bower

//! Closed type model shared by the registry, the wire compiler and every
//! binding backend. Consumers are expected to match these enums exhaustively.

use serde::{Deserialize, Serialize};

/// Maximum number of optional arguments per action. The optarg bitmask is a
/// 64-bit word with the top bit reserved.
pub const MAX_OPTARGS: usize = 63;

/// Required parameter kinds.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ParamType {
    /// Arbitrary UTF-8 string.
    PlainString,
    /// String that may be absent.
    OptionalString,
    /// Ordered list of strings.
    StringList,
    /// Boolean flag.
    Bool,
    /// Signed 32-bit integer.
    Int32,
    /// Signed 64-bit integer.
    Int64,
    /// Absolute path inside the appliance filesystem.
    PathString,
    /// Block device name.
    DeviceString,
    /// Device, logical volume or label reference.
    MountableString,
    /// Mountable reference or absolute path.
    MountableOrPathString,
    /// List of file names relative to a directory argument.
    FilenameList,
    /// Length-prefixed inline blob sent to the daemon.
    RawBytesIn,
    /// Bulk file sent to the daemon out-of-band.
    StreamIn,
    /// Bulk file produced by the daemon out-of-band.
    StreamOut,
    /// Foreign handle identified by its type tag.
    OpaqueHandle(String),
    /// GUID in textual form.
    GuidString,
    /// Secret such as a passphrase; never logged.
    SecretString,
}

/// Direction of an out-of-band bulk transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StreamDirection {
    /// Client sends chunks after the call message.
    Upload,
    /// Daemon sends chunks before the reply message.
    Download,
}

impl ParamType {
    /// Short label used in diagnostics and generated documentation.
    #[must_use]
    pub fn label(&self) -> &str {
        match self {
            Self::PlainString => "string",
            Self::OptionalString => "optional string",
            Self::StringList => "string list",
            Self::Bool => "bool",
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::PathString => "path",
            Self::DeviceString => "device",
            Self::MountableString => "mountable",
            Self::MountableOrPathString => "mountable or path",
            Self::FilenameList => "filename list",
            Self::RawBytesIn => "buffer",
            Self::StreamIn => "upload stream",
            Self::StreamOut => "download stream",
            Self::OpaqueHandle(tag) => tag.as_str(),
            Self::GuidString => "guid",
            Self::SecretString => "secret",
        }
    }

    /// Direction of the out-of-band transfer, if this is a streaming parameter.
    #[must_use]
    pub fn stream_direction(&self) -> Option<StreamDirection> {
        match self {
            Self::StreamIn => Some(StreamDirection::Upload),
            Self::StreamOut => Some(StreamDirection::Download),
            Self::PlainString
            | Self::OptionalString
            | Self::StringList
            | Self::Bool
            | Self::Int32
            | Self::Int64
            | Self::PathString
            | Self::DeviceString
            | Self::MountableString
            | Self::MountableOrPathString
            | Self::FilenameList
            | Self::RawBytesIn
            | Self::OpaqueHandle(_)
            | Self::GuidString
            | Self::SecretString => None,
        }
    }

    /// Whether the value must be an absolute appliance path.
    #[must_use]
    pub fn requires_absolute_path(&self) -> bool {
        matches!(self, Self::PathString)
    }

    /// Whether values of this kind must be redacted from logs and traces.
    #[must_use]
    pub fn is_secret(&self) -> bool {
        matches!(self, Self::SecretString)
    }
}

/// Optional argument kinds. Presence is tracked by the optarg bitmask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OptParamType {
    /// Optional boolean.
    Bool,
    /// Optional signed 32-bit integer.
    Int32,
    /// Optional signed 64-bit integer.
    Int64,
    /// Optional string.
    PlainString,
    /// Optional list of strings.
    StringList,
}

impl OptParamType {
    /// Short label used in diagnostics and generated documentation.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::PlainString => "string",
            Self::StringList => "string list",
        }
    }
}

/// Return shapes of an action.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReturnShape {
    /// Success or failure only.
    NoResult,
    /// Signed 32-bit integer.
    Int32,
    /// Signed 64-bit integer.
    Int64,
    /// Boolean.
    Bool,
    /// String owned by the library handle.
    ConstString,
    /// String owned by the library handle, possibly absent.
    ConstOptionalString,
    /// String owned by the caller.
    OwnedString,
    /// List of strings.
    StringList,
    /// One instance of a named struct.
    NamedStruct(String),
    /// List of instances of a named struct.
    NamedStructList(String),
    /// Ordered key/value pairs.
    StringMap,
    /// Length-prefixed inline blob returned by the daemon.
    RawBytesOut,
}

impl ReturnShape {
    /// The struct tag this shape refers to, if any.
    #[must_use]
    pub fn struct_tag(&self) -> Option<&str> {
        match self {
            Self::NamedStruct(tag) | Self::NamedStructList(tag) => Some(tag.as_str()),
            Self::NoResult
            | Self::Int32
            | Self::Int64
            | Self::Bool
            | Self::ConstString
            | Self::ConstOptionalString
            | Self::OwnedString
            | Self::StringList
            | Self::StringMap
            | Self::RawBytesOut => None,
        }
    }

    /// Short label used in diagnostics and generated documentation.
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::NoResult => "nothing".to_owned(),
            Self::Int32 => "int32".to_owned(),
            Self::Int64 => "int64".to_owned(),
            Self::Bool => "bool".to_owned(),
            Self::ConstString | Self::OwnedString => "string".to_owned(),
            Self::ConstOptionalString => "optional string".to_owned(),
            Self::StringList => "string list".to_owned(),
            Self::NamedStruct(tag) => format!("struct {tag}"),
            Self::NamedStructList(tag) => format!("list of struct {tag}"),
            Self::StringMap => "string map".to_owned(),
            Self::RawBytesOut => "buffer".to_owned(),
        }
    }
}

impl Default for ReturnShape {
    fn default() -> Self {
        Self::NoResult
    }
}

/// A named required parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Param {
    pub name: String,
    pub kind: ParamType,
}

/// A named optional argument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OptParam {
    pub name: String,
    pub kind: OptParamType,
}

/// Where an action's implementation runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActionKind {
    /// Runs inside the appliance; carries a procedure number.
    Daemon,
    /// Runs in the client library.
    NonDaemon,
    /// Client-side action that exists only to exercise bindings.
    InternalTest,
}

/// Who may see an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Visibility {
    Public,
    PublicNoInteractive,
    StateTest,
    BindTest,
    Debug,
    Internal,
}

impl Default for Visibility {
    fn default() -> Self {
        Self::Public
    }
}

impl Visibility {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::PublicNoInteractive => "public-no-interactive",
            Self::StateTest => "state-test",
            Self::BindTest => "bind-test",
            Self::Debug => "debug",
            Self::Internal => "internal",
        }
    }
}

/// Field kinds available to named structs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FieldKind {
    String,
    Bytes,
    /// 32 ASCII characters, not NUL terminated.
    Uuid,
    Int32,
    #[serde(rename = "uint32")]
    UInt32,
    Int64,
    #[serde(rename = "uint64")]
    UInt64,
    Char,
    /// Percentage in `[0, 100]`, or `-1` when unknown.
    OptPercent,
}

/// Field of a named struct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StructField {
    pub name: String,
    pub kind: FieldKind,
}

/// Named struct returned by `NamedStruct`/`NamedStructList` actions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StructDef {
    pub name: String,
    pub fields: Vec<StructField>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct Holder {
        params: Vec<Param>,
        returns: ReturnShape,
    }

    #[test]
    fn parses_kebab_case_kinds_from_toml() {
        let holder: Holder = toml::from_str(
            r#"
returns = { named-struct-list = "partition" }
params = [
  { name = "dom", kind = { opaque-handle = "virDomainPtr" } },
  { name = "path", kind = "path-string" },
  { name = "key", kind = "secret-string" },
]
"#,
        )
        .expect("parse holder");
        assert_eq!(
            holder.returns,
            ReturnShape::NamedStructList("partition".to_owned())
        );
        assert_eq!(
            holder.params[0].kind,
            ParamType::OpaqueHandle("virDomainPtr".to_owned())
        );
        assert!(holder.params[1].kind.requires_absolute_path());
        assert!(holder.params[2].kind.is_secret());
    }

    #[test]
    fn stream_directions_are_reported() {
        assert_eq!(
            ParamType::StreamIn.stream_direction(),
            Some(StreamDirection::Upload)
        );
        assert_eq!(
            ParamType::StreamOut.stream_direction(),
            Some(StreamDirection::Download)
        );
        assert_eq!(ParamType::RawBytesIn.stream_direction(), None);
    }
}
