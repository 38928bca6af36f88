use serde::{Deserialize, Serialize};
use std::fmt;

/// Interface category a control belongs to.
///
/// Variant order is the primary key of the default element order.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Interface {
    Card,
    Hwdep,
    #[default]
    Mixer,
    Pcm,
    Rawmidi,
    Timer,
    Sequencer,
}

impl Interface {
    pub fn as_str(&self) -> &'static str {
        match self {
            Interface::Card => "CARD",
            Interface::Hwdep => "HWDEP",
            Interface::Mixer => "MIXER",
            Interface::Pcm => "PCM",
            Interface::Rawmidi => "RAWMIDI",
            Interface::Timer => "TIMER",
            Interface::Sequencer => "SEQUENCER",
        }
    }
}

/// Full identifier of a device control.
///
/// `numid` is assigned by the device and stays stable for the lifetime of
/// the control. The remaining fields are what the default order sorts by.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElemId {
    pub numid: u32,
    pub iface: Interface,
    #[serde(default)]
    pub device: u32,
    #[serde(default)]
    pub subdevice: u32,
    pub name: String,
    #[serde(default)]
    pub index: u32,
}

impl ElemId {
    pub fn new(numid: u32, iface: Interface, name: impl Into<String>, index: u32) -> Self {
        Self {
            numid,
            iface,
            device: 0,
            subdevice: 0,
            name: name.into(),
            index,
        }
    }

    /// Mixer-interface control with sub-index 0
    pub fn mixer(numid: u32, name: impl Into<String>) -> Self {
        Self::new(numid, Interface::Mixer, name, 0)
    }

    pub fn with_index(mut self, index: u32) -> Self {
        self.index = index;
        self
    }

    pub fn with_device(mut self, device: u32, subdevice: u32) -> Self {
        self.device = device;
        self.subdevice = subdevice;
        self
    }
}

impl fmt::Display for ElemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "numid={},iface={},name='{}'",
            self.numid,
            self.iface.as_str(),
            self.name
        )?;
        if self.index != 0 {
            write!(f, ",index={}", self.index)?;
        }
        if self.device != 0 {
            write!(f, ",device={}", self.device)?;
        }
        if self.subdevice != 0 {
            write!(f, ",subdevice={}", self.subdevice)?;
        }
        Ok(())
    }
}

/// Value type of a control
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ElemType {
    None,
    Boolean,
    Integer,
    Enumerated,
    Bytes,
    Iec958,
    Integer64,
}

/// Linear dB scale in 0.01 dB units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DbScale {
    pub min: i64,
    pub max: i64,
    /// The minimum value mutes instead of attenuating.
    #[serde(default)]
    pub mute: bool,
}

/// Static description of a control as reported by the device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlInfo {
    pub elem_type: ElemType,
    /// Number of values (channels) the control carries
    pub count: u32,
    #[serde(default)]
    pub min: i64,
    #[serde(default)]
    pub max: i64,
    #[serde(default)]
    pub step: i64,
    #[serde(default)]
    pub db: Option<DbScale>,
    /// Item names of an enumerated control
    #[serde(default)]
    pub items: Vec<String>,
}

impl ControlInfo {
    pub fn boolean(count: u32) -> Self {
        Self {
            elem_type: ElemType::Boolean,
            count,
            min: 0,
            max: 1,
            step: 0,
            db: None,
            items: Vec::new(),
        }
    }

    pub fn integer(count: u32, min: i64, max: i64) -> Self {
        Self {
            elem_type: ElemType::Integer,
            count,
            min,
            max,
            step: 0,
            db: None,
            items: Vec::new(),
        }
    }

    pub fn enumerated<S: Into<String>>(count: u32, items: impl IntoIterator<Item = S>) -> Self {
        let items: Vec<String> = items.into_iter().map(Into::into).collect();
        Self {
            elem_type: ElemType::Enumerated,
            count,
            min: 0,
            max: items.len().saturating_sub(1) as i64,
            step: 0,
            db: None,
            items,
        }
    }

    /// Attach a linear dB scale (0.01 dB units)
    pub fn with_db(mut self, min: i64, max: i64) -> Self {
        self.db = Some(DbScale {
            min,
            max,
            mute: false,
        });
        self
    }

    pub fn is_enumerated(&self) -> bool {
        self.elem_type == ElemType::Enumerated
    }

    pub fn is_boolean(&self) -> bool {
        self.elem_type == ElemType::Boolean
    }
}
