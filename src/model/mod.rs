//! The model module contains the SunSpec information model: the data type
//! catalog, model definitions parsed from schema text, the registry caching
//! them, and the model/block/point instances built over a device's registers.

pub mod block;
pub mod data_type;
pub mod instance;
pub mod point;
pub mod registry;
pub mod schema;
pub mod value;

pub use block::{Block, WriteRun};
pub use data_type::{find_data_type, DataType, TypeKind};
pub use instance::Model;
pub use point::{Point, PointRef, ScaleFactor};
pub use registry::{
    BuiltinSchemaSource, ChainedSchemaSource, DirSchemaSource, SchemaRegistry, SchemaSource,
    StaticSchemaSource,
};
pub use schema::{parse_model_defs, Access, BlockDef, BlockKind, ModelDef, PointDef, ScaleFactorDef};
pub use value::{BaseType, RegisterPrimitive, Value};
