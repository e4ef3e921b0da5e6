//! `sysflow.entity.Container`.

use std::io::{Read, Write};

use sysflow_avro::{
    eval, write, ContractViolation, EnumAccess, Field, FieldAccessor, FieldMut, Fingerprint,
    Result, Value,
};

use crate::cache::ProgramCache;
use crate::container_type::ContainerType;

/// Schema this build of the entity was generated from.
pub const SCHEMA: &str = r#"{"fields":[{"name":"id","type":"string"},{"name":"name","type":"string"},{"name":"image","type":"string"},{"name":"imageid","type":"string"},{"name":"type","type":{"name":"ContainerType","namespace":"sysflow.type","symbols":["CT_DOCKER","CT_LXC","CT_LIBVIRT_LXC","CT_MESOS","CT_RKT","CT_CUSTOM","CT_CRI","CT_CONTAINERD","CT_CRIO","CT_BPM"],"type":"enum"}},{"name":"privileged","type":"boolean"},{"default":"NA","name":"imagerepo","type":"string"}],"name":"sysflow.entity.Container","type":"record"}"#;

pub const SCHEMA_NAME: &str = "sysflow.entity.Container";

/// Rabin fingerprint of the canonical form of [`SCHEMA`].
pub const FINGERPRINT: Fingerprint =
    Fingerprint::from_bytes([0xa2, 0x31, 0x4d, 0x45, 0x4d, 0x1d, 0x3f, 0x9b]);

const IMAGEREPO_DEFAULT: &str = "NA";

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Container {
    pub id: String,
    pub name: String,
    pub image: String,
    pub imageid: String,
    pub type_: ContainerType,
    pub privileged: bool,
    pub imagerepo: String,
}

impl Container {
    /// Reads one container written with [`SCHEMA`].
    pub fn deserialize<R: Read>(r: R) -> Result<Self> {
        Self::deserialize_from_schema(r, SCHEMA)
    }

    /// Reads one container written with `writer_schema`, resolved into the
    /// current shape.
    pub fn deserialize_from_schema<R: Read>(r: R, writer_schema: &str) -> Result<Self> {
        let program = ProgramCache::global().program(writer_schema, SCHEMA)?;
        let mut container = Container::default();
        eval(&program, r, &mut container)?;
        Ok(container)
    }

    pub fn serialize<W: Write>(&self, w: W) -> Result<()> {
        let schema = ProgramCache::global().schema(SCHEMA)?;
        write(&schema, self, w)
    }

    pub fn schema(&self) -> &'static str {
        SCHEMA
    }

    pub fn schema_name(&self) -> &'static str {
        SCHEMA_NAME
    }

    pub fn fingerprint(&self) -> Fingerprint {
        FINGERPRINT
    }
}

impl FieldAccessor for Container {
    fn field_count(&self) -> usize {
        7
    }

    fn field(&self, index: usize) -> std::result::Result<Field<'_>, ContractViolation> {
        Ok(match index {
            0 => Field::String(&self.id),
            1 => Field::String(&self.name),
            2 => Field::String(&self.image),
            3 => Field::String(&self.imageid),
            4 => Field::Enum(self.type_.index()),
            5 => Field::Boolean(self.privileged),
            6 => Field::String(&self.imagerepo),
            other => return Err(ContractViolation::UnknownField(other)),
        })
    }

    fn field_mut(&mut self, index: usize) -> std::result::Result<FieldMut<'_>, ContractViolation> {
        Ok(match index {
            0 => FieldMut::String(&mut self.id),
            1 => FieldMut::String(&mut self.name),
            2 => FieldMut::String(&mut self.image),
            3 => FieldMut::String(&mut self.imageid),
            4 => FieldMut::Enum(&mut self.type_),
            5 => FieldMut::Boolean(&mut self.privileged),
            6 => FieldMut::String(&mut self.imagerepo),
            other => return Err(ContractViolation::UnknownField(other)),
        })
    }

    fn set_default(
        &mut self,
        index: usize,
        _default: &Value,
    ) -> std::result::Result<(), ContractViolation> {
        match index {
            6 => {
                self.imagerepo = IMAGEREPO_DEFAULT.to_string();
                Ok(())
            }
            other => Err(ContractViolation::NoDefault(other)),
        }
    }
}
