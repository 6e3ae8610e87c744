//! Loads a CiA 306-1 EDS into an ordered map of object descriptors keyed by
//! 24-bit multiplexer `(index << 8) | sub`. Complex objects are flattened:
//! each populated sub-index becomes its own descriptor, and sub 0 carries the
//! length entry named "<parent> Length".

use std::collections::{BTreeMap, HashMap};

use ini_core as ini;
use log::{info, warn};

use crate::data_type::DataType;
use crate::error::BuildError;
use crate::format::{constant_name, signal_name};
use crate::util::{object_section, parse_int};
use crate::value::{get_default, get_limit, DefaultExpr};

pub type Mux = u32;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccessType {
    Const,
    Ro,
    Rw,
    Wo,
}

impl AccessType {
    pub fn from_str(s: &str, name: &str) -> Result<Self, BuildError> {
        match s {
            "const" => Ok(AccessType::Const),
            "ro" => Ok(AccessType::Ro),
            "rw" | "rwr" | "rww" => Ok(AccessType::Rw),
            "wo" => Ok(AccessType::Wo),
            _ => Err(BuildError::UnsupportedAccess {
                name: name.to_string(),
                access: s.to_string(),
            }),
        }
    }

    pub fn is_readable(&self) -> bool {
        !matches!(*self, AccessType::Wo)
    }

    pub fn is_writable(&self) -> bool {
        matches!(*self, AccessType::Rw | AccessType::Wo)
    }
}

#[derive(Clone, Debug)]
pub struct ObjectDescriptor {
    parameter_name: String,
    constant_name: String,
    signal_name: String,
    index: u16,
    sub_index: u8,
    access_type: AccessType,
    data_type: DataType,
    default: Option<DefaultExpr>,
    low_limit: Option<u64>,
    high_limit: Option<u64>,
    pdo_mapping: bool,
}

impl ObjectDescriptor {
    pub fn parameter_name(&self) -> &str {
        &self.parameter_name
    }
    pub fn index(&self) -> u16 {
        self.index
    }
    pub fn sub_index(&self) -> u8 {
        self.sub_index
    }
    pub fn mux(&self) -> Mux {
        ((self.index as u32) << 8) | self.sub_index as u32
    }
    pub fn access_type(&self) -> AccessType {
        self.access_type
    }
    pub fn data_type(&self) -> DataType {
        self.data_type
    }
    pub fn bit_length(&self) -> u32 {
        self.data_type.bit_length()
    }
    pub fn default(&self) -> Option<&DefaultExpr> {
        self.default.as_ref()
    }
    pub fn low_limit(&self) -> Option<u64> {
        self.low_limit
    }
    pub fn high_limit(&self) -> Option<u64> {
        self.high_limit
    }
    pub fn pdo_mapping(&self) -> bool {
        self.pdo_mapping
    }

    /// Canonical identifier used for uniqueness checks.
    pub fn canonical(&self) -> &str {
        &self.constant_name
    }

    /// The identifier the object is declared under in the entity: constants
    /// use the `\UPPER_SNAKE\` form, everything else the `\CamelCase\` form.
    pub fn name(&self) -> String {
        match self.access_type {
            AccessType::Const => format!("\\{}\\", self.constant_name),
            _ => format!("\\{}\\", self.signal_name),
        }
    }

    /// The `\ODI_*\` mux constant naming this object in SDO case arms.
    pub fn odi_name(&self) -> String {
        format!("\\ODI_{}\\", self.constant_name)
    }

    /// Internal buffer behind a read-write output port.
    pub fn buffer_name(&self) -> String {
        format!("\\{}_q\\", self.signal_name)
    }

    /// Write-strobe companion of a write-only port.
    pub fn strobe_name(&self) -> String {
        format!("\\{}_strb\\", self.signal_name)
    }

    /// The default as a literal bit pattern; zero when symbolic or absent.
    pub fn default_literal(&self) -> u64 {
        self.default.as_ref().and_then(|d| d.literal()).unwrap_or(0)
    }

    /// VHDL expression of the default in the object's declared type.
    pub fn default_expr(&self) -> String {
        match self.default.as_ref() {
            Some(d) => d.render(self.data_type),
            None => DefaultExpr::Literal(0).render(self.data_type),
        }
    }
}

pub struct ObjectDirectory {
    entity_name: String,
    objects: BTreeMap<Mux, ObjectDescriptor>,
}

impl ObjectDirectory {
    pub fn from_eds(content: &str) -> Result<Self, BuildError> {
        let sections = collect_sections(content);

        let product_name = sections
            .get("DEVICEINFO")
            .ok_or_else(|| BuildError::MissingSection { section: "DeviceInfo".to_string() })?
            .get("productname")
            .ok_or_else(|| BuildError::MissingProperty {
                section: "DeviceInfo".to_string(),
                property: "ProductName".to_string(),
            })?;
        let entity_name = format!("{}CanOpen", signal_name(product_name, "", "")?);

        let mut od = ObjectDirectory { entity_name, objects: BTreeMap::new() };
        for index in supported_indices(&sections)? {
            od.load_object(&sections, index)?;
        }
        for name in sections.keys() {
            if let Some((index, sub)) = object_section(name) {
                let mux = ((index as u32) << 8) | sub.unwrap_or(0) as u32;
                if !od.objects.contains_key(&mux) {
                    warn!("Section [{}] is not referenced by any object list", name);
                }
            }
        }
        Ok(od)
    }

    pub fn entity_name(&self) -> &str {
        &self.entity_name
    }

    pub fn objects(&self) -> &BTreeMap<Mux, ObjectDescriptor> {
        &self.objects
    }

    pub fn get(&self, mux: Mux) -> Option<&ObjectDescriptor> {
        self.objects.get(&mux)
    }

    pub fn contains(&self, mux: Mux) -> bool {
        self.objects.contains_key(&mux)
    }

    /// Populated sub-entries (sub >= 1) of a complex object, in sub order.
    pub fn sub_entries(&self, index: u16) -> impl Iterator<Item = &ObjectDescriptor> {
        let lo = ((index as u32) << 8) + 1;
        let hi = ((index as u32) << 8) | 0xFF;
        self.objects.range(lo..=hi).map(|(_, desc)| desc)
    }

    fn load_object(
        &mut self,
        sections: &BTreeMap<String, HashMap<String, String>>,
        index: u16,
    ) -> Result<(), BuildError> {
        let section_name = format!("{:04X}", index);
        let properties = sections
            .get(&section_name)
            .ok_or_else(|| BuildError::MissingSection { section: section_name.clone() })?;

        match properties.get("subnumber") {
            None => {
                let name = required(properties, &section_name, "parametername")?;
                let desc = build_descriptor(properties, &section_name, name, index, 0)?;
                self.insert(desc);
            }
            Some(raw) => {
                let sub_number: u8 = parse_int(raw).ok_or_else(|| BuildError::InvalidNumber {
                    section: section_name.clone(),
                    text: raw.clone(),
                })?;
                let parent_name = required(properties, &section_name, "parametername")?;
                let mut found = 0u16;
                let mut si = 0u16;
                while found <= sub_number as u16 && si <= 0xFF {
                    let sub_section = format!("{:04X}SUB{}", index, si);
                    if let Some(sub_properties) = sections.get(&sub_section) {
                        let name = if si == 0 {
                            format!("{} Length", parent_name)
                        } else {
                            required(sub_properties, &sub_section, "parametername")?.clone()
                        };
                        let desc =
                            build_descriptor(sub_properties, &sub_section, &name, index, si as u8)?;
                        self.insert(desc);
                        found += 1;
                    }
                    si += 1;
                }
            }
        }
        Ok(())
    }

    fn insert(&mut self, desc: ObjectDescriptor) {
        info!("{} => {}", desc.parameter_name(), desc.name());
        self.objects.insert(desc.mux(), desc);
    }
}

fn required<'a>(
    properties: &'a HashMap<String, String>,
    section: &str,
    property: &str,
) -> Result<&'a String, BuildError> {
    properties.get(property).ok_or_else(|| BuildError::MissingProperty {
        section: section.to_string(),
        property: property.to_string(),
    })
}

fn build_descriptor(
    properties: &HashMap<String, String>,
    section: &str,
    name: &str,
    index: u16,
    sub_index: u8,
) -> Result<ObjectDescriptor, BuildError> {
    let access_raw = properties
        .get("accesstype")
        .map(|s| s.to_lowercase())
        .unwrap_or_else(|| "rw".to_string());
    let access_type = AccessType::from_str(&access_raw, name)?;

    let dt_raw = required(properties, section, "datatype")?;
    let dt_val: u32 = parse_int(dt_raw).ok_or_else(|| BuildError::InvalidNumber {
        section: section.to_string(),
        text: dt_raw.clone(),
    })?;
    let data_type = DataType::from_index(dt_val)?;

    let pdo_mapping = properties
        .get("pdomapping")
        .and_then(|s| parse_int::<u32>(s))
        .unwrap_or(0)
        != 0;

    let default = if data_type == DataType::Domain {
        None
    } else {
        get_default(properties, "defaultvalue", data_type, name)?
    };

    let (low_limit, high_limit) = if access_type.is_writable() {
        (
            get_limit(properties, "lowlimit", data_type, name)?,
            get_limit(properties, "highlimit", data_type, name)?,
        )
    } else {
        (None, None)
    };

    Ok(ObjectDescriptor {
        constant_name: constant_name(name, "", "")?,
        signal_name: signal_name(name, "", "")?,
        parameter_name: name.to_string(),
        index,
        sub_index,
        access_type,
        data_type,
        default,
        low_limit,
        high_limit,
        pdo_mapping,
    })
}

/// Object indices announced by the three object-list sections, in listing
/// order.
fn supported_indices(
    sections: &BTreeMap<String, HashMap<String, String>>,
) -> Result<Vec<u16>, BuildError> {
    let mut indices = Vec::new();
    for list in ["MANDATORYOBJECTS", "OPTIONALOBJECTS", "MANUFACTUREROBJECTS"] {
        let Some(properties) = sections.get(list) else { continue };
        let count_raw = required(properties, list, "supportedobjects")?;
        let count: u32 = parse_int(count_raw).ok_or_else(|| BuildError::InvalidNumber {
            section: list.to_string(),
            text: count_raw.clone(),
        })?;
        for i in 1..=count {
            let entry = required(properties, list, &i.to_string())?;
            let index: u16 = parse_int(entry).ok_or_else(|| BuildError::InvalidNumber {
                section: list.to_string(),
                text: entry.clone(),
            })?;
            indices.push(index);
        }
    }
    Ok(indices)
}

/// Assembles `section name -> property map` from the INI stream. Section
/// names are uppercased and property keys lowercased, so lookups are
/// case-insensitive the way EDS readers conventionally are.
fn collect_sections(content: &str) -> BTreeMap<String, HashMap<String, String>> {
    let mut sections: BTreeMap<String, HashMap<String, String>> = BTreeMap::new();
    let mut current_section_name: Option<String> = None;
    let mut current_properties: HashMap<String, String> = HashMap::new();

    for item in ini::Parser::new(content) {
        match item {
            ini::Item::Section(name) => {
                if let Some(section_name) = current_section_name.take() {
                    sections.insert(section_name, core::mem::take(&mut current_properties));
                }
                current_section_name = Some(name.trim().to_uppercase());
            }
            ini::Item::Property(key, maybe_value) => {
                let value = String::from(maybe_value.unwrap_or_default().trim());
                current_properties.insert(key.trim().to_lowercase(), value);
            }
            _ => {} // comments and section-end markers carry nothing
        }
    }
    if let Some(section_name) = current_section_name {
        sections.insert(section_name, current_properties);
    }
    sections
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL_EDS: &str = "\
[DeviceInfo]\n\
ProductName=Test Device\n\
\n\
[MandatoryObjects]\n\
SupportedObjects=2\n\
1=0x1000\n\
2=0x1001\n\
\n\
[1000]\n\
ParameterName=Device type\n\
DataType=0x0007\n\
AccessType=const\n\
DefaultValue=0x00000191\n\
\n\
[1001]\n\
ParameterName=Error register\n\
DataType=0x0005\n\
AccessType=ro\n\
DefaultValue=0\n\
\n\
[OptionalObjects]\n\
SupportedObjects=1\n\
1=0x1018\n\
\n\
[1018]\n\
ParameterName=Identity Object\n\
SubNumber=2\n\
\n\
[1018sub0]\n\
ParameterName=Number of entries\n\
DataType=0x0005\n\
AccessType=ro\n\
DefaultValue=1\n\
\n\
[1018sub1]\n\
ParameterName=Vendor-ID\n\
DataType=0x0007\n\
AccessType=ro\n\
DefaultValue=0x00000001\n";

    #[test]
    fn test_load_minimal() {
        let od = ObjectDirectory::from_eds(MINIMAL_EDS).unwrap();
        assert_eq!(od.entity_name(), "TestDeviceCanOpen");
        assert_eq!(od.objects().len(), 4);

        let dev = od.get(0x1000_00).unwrap();
        assert_eq!(dev.parameter_name(), "Device type");
        assert_eq!(dev.access_type(), AccessType::Const);
        assert_eq!(dev.data_type(), DataType::Unsigned32);
        assert_eq!(dev.default_literal(), 0x191);
        assert_eq!(dev.name(), "\\DEVICE_TYPE\\");
        assert_eq!(dev.odi_name(), "\\ODI_DEVICE_TYPE\\");

        let len = od.get(0x1018_00).unwrap();
        assert_eq!(len.parameter_name(), "Identity Object Length");
        assert_eq!(len.canonical(), "IDENTITY_OBJECT_LENGTH");

        let vendor = od.get(0x1018_01).unwrap();
        assert_eq!(vendor.name(), "\\VendorId\\");
        assert_eq!(vendor.sub_index(), 1);
    }

    #[test]
    fn test_sub_entries_iterator() {
        let od = ObjectDirectory::from_eds(MINIMAL_EDS).unwrap();
        let subs: Vec<u8> = od.sub_entries(0x1018).map(|d| d.sub_index()).collect();
        assert_eq!(subs, vec![1]);
    }

    #[test]
    fn test_missing_product_name() {
        assert!(matches!(
            ObjectDirectory::from_eds("[DeviceInfo]\nVendorName=x\n"),
            Err(BuildError::MissingProperty { .. })
        ));
    }

    #[test]
    fn test_unknown_data_type_is_fatal() {
        let eds = "\
[DeviceInfo]\nProductName=T\n\
[MandatoryObjects]\nSupportedObjects=1\n1=0x1000\n\
[1000]\nParameterName=Device type\nDataType=0x0009\nAccessType=const\nDefaultValue=0\n";
        assert!(matches!(
            ObjectDirectory::from_eds(eds),
            Err(BuildError::UnsupportedDataType { index: 9 })
        ));
    }
}
