//! Pre-instantiation module checks
//!
//! The browser's own link errors say little about what went wrong, so the
//! host walks the module's type, import, function and export sections
//! itself and rejects anything that does not match the configured import
//! and export surface before instantiation is attempted.

use super::abi::{self, kind, valtype};
use super::error::{LoadError, LoadResult};
use crate::config::HostConfig;

/// WASM magic number: \0asm
const WASM_MAGIC: [u8; 4] = [0x00, 0x61, 0x73, 0x6D];

/// WASM version 1
const WASM_VERSION: [u8; 4] = [0x01, 0x00, 0x00, 0x00];

mod section {
    pub const TYPE: u8 = 1;
    pub const IMPORT: u8 = 2;
    pub const FUNCTION: u8 = 3;
    pub const EXPORT: u8 = 7;
}

/// A function signature
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FuncType {
    pub params: Vec<u8>,
    pub results: Vec<u8>,
}

impl FuncType {
    fn is_callback(&self) -> bool {
        self.params == [valtype::I32] && self.results.is_empty()
    }

    fn is_frame_export(&self, arity: usize) -> bool {
        self.params.len() == arity
            && self.params.iter().all(|&p| p == valtype::I32)
            && self.results.is_empty()
    }
}

impl std::fmt::Display for FuncType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let list = |types: &[u8]| {
            types
                .iter()
                .map(|&t| valtype::name(t))
                .collect::<Vec<_>>()
                .join(", ")
        };
        write!(f, "({}) -> ({})", list(&self.params), list(&self.results))
    }
}

/// One entry of the import section
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Import {
    pub module: String,
    pub name: String,
    pub kind: u8,
    /// Type index for function imports
    pub type_index: Option<u32>,
}

/// One entry of the export section
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Export {
    pub name: String,
    pub kind: u8,
    pub index: u32,
}

/// The parts of a module the host cares about
#[derive(Debug, Clone, Default)]
pub struct ModuleSummary {
    pub types: Vec<FuncType>,
    pub imports: Vec<Import>,
    /// Type index of each module-defined function
    pub functions: Vec<u32>,
    pub exports: Vec<Export>,
}

impl ModuleSummary {
    /// Parse the header and the sections we need, skipping the rest
    pub fn parse(bytes: &[u8]) -> LoadResult<Self> {
        if bytes.len() < 8 {
            return Err(invalid("module too small"));
        }
        if bytes[0..4] != WASM_MAGIC {
            return Err(invalid("invalid magic number"));
        }
        if bytes[4..8] != WASM_VERSION {
            return Err(invalid("unsupported WASM version"));
        }

        let mut summary = Self::default();
        let mut reader = Reader::new(&bytes[8..]);

        while !reader.is_empty() {
            let id = reader.byte()?;
            let size = reader.leb128()? as usize;
            let mut body = Reader::new(reader.take(size)?);

            match id {
                section::TYPE => summary.types = parse_types(&mut body)?,
                section::IMPORT => summary.imports = parse_imports(&mut body)?,
                section::FUNCTION => summary.functions = body.vec(|r| r.leb128())?,
                section::EXPORT => summary.exports = parse_exports(&mut body)?,
                _ => {}
            }
        }

        Ok(summary)
    }

    /// Signature of a function in the module's function index space
    /// (imported functions first, then defined ones)
    pub fn func_type(&self, func_index: u32) -> Option<&FuncType> {
        let imported: Vec<u32> = self
            .imports
            .iter()
            .filter_map(|i| i.type_index)
            .collect();
        let index = func_index as usize;
        let type_index = if index < imported.len() {
            imported[index]
        } else {
            *self.functions.get(index - imported.len())?
        };
        self.types.get(type_index as usize)
    }

    pub fn export(&self, name: &str) -> Option<&Export> {
        self.exports.iter().find(|e| e.name == name)
    }
}

/// Validates modules against a host configuration
pub struct ModuleValidator<'a> {
    config: &'a HostConfig,
}

impl<'a> ModuleValidator<'a> {
    pub fn new(config: &'a HostConfig) -> Self {
        Self { config }
    }

    /// Validate a WASM module binary
    ///
    /// Checks:
    /// - Valid WASM magic number and version
    /// - The only import is the color callback, with signature `(i32) -> ()`
    /// - Memory and frame exports are present with the right kinds
    /// - The frame export takes the configured number of i32 parameters
    pub fn validate(&self, bytes: &[u8]) -> LoadResult<ModuleSummary> {
        let summary = ModuleSummary::parse(bytes)?;
        self.check_imports(&summary)?;
        self.check_exports(&summary)?;
        Ok(summary)
    }

    fn check_imports(&self, summary: &ModuleSummary) -> LoadResult<()> {
        for import in &summary.imports {
            let is_callback = import.module == self.config.import_namespace
                && import.name == self.config.callback_name
                && import.kind == kind::FUNC;
            if !is_callback {
                return Err(LoadError::UnresolvedImport {
                    module: import.module.clone(),
                    name: import.name.clone(),
                });
            }

            let ty = import
                .type_index
                .and_then(|i| summary.types.get(i as usize))
                .ok_or_else(|| invalid("import refers to unknown type"))?;
            if !ty.is_callback() {
                return Err(LoadError::ImportSignatureMismatch {
                    name: import.name.clone(),
                    expected: abi::CALLBACK_SIGNATURE,
                    got: ty.to_string(),
                });
            }
        }
        Ok(())
    }

    fn check_exports(&self, summary: &ModuleSummary) -> LoadResult<()> {
        let memory_name = &self.config.memory_export;
        let memory = summary
            .export(memory_name)
            .ok_or_else(|| LoadError::MissingExport {
                name: memory_name.clone(),
            })?;
        if memory.kind != kind::MEMORY {
            return Err(LoadError::WrongExportType {
                name: memory_name.clone(),
                expected: "memory".to_string(),
                got: kind::name(memory.kind).to_string(),
            });
        }

        let frame_name = &self.config.frame_export;
        let frame = summary
            .export(frame_name)
            .ok_or_else(|| LoadError::MissingExport {
                name: frame_name.clone(),
            })?;
        if frame.kind != kind::FUNC {
            return Err(LoadError::WrongExportType {
                name: frame_name.clone(),
                expected: "function".to_string(),
                got: kind::name(frame.kind).to_string(),
            });
        }

        let arity = self.config.frame_arity();
        let ty = summary
            .func_type(frame.index)
            .ok_or_else(|| invalid("export refers to unknown function"))?;
        if !ty.is_frame_export(arity) {
            let expected = FuncType {
                params: vec![valtype::I32; arity],
                results: Vec::new(),
            };
            return Err(LoadError::WrongExportType {
                name: frame_name.clone(),
                expected: expected.to_string(),
                got: ty.to_string(),
            });
        }

        Ok(())
    }
}

fn invalid(reason: &str) -> LoadError {
    LoadError::InvalidModule {
        reason: reason.to_string(),
    }
}

fn parse_types(r: &mut Reader<'_>) -> LoadResult<Vec<FuncType>> {
    r.vec(|r| {
        if r.byte()? != 0x60 {
            return Err(invalid("expected func type"));
        }
        let params = r.vec(|r| r.byte())?;
        let results = r.vec(|r| r.byte())?;
        Ok(FuncType { params, results })
    })
}

fn parse_imports(r: &mut Reader<'_>) -> LoadResult<Vec<Import>> {
    r.vec(|r| {
        let module = r.name()?;
        let name = r.name()?;
        let kind = r.byte()?;
        let mut type_index = None;
        match kind {
            kind::FUNC => type_index = Some(r.leb128()?),
            kind::TABLE => {
                r.byte()?; // reftype
                r.limits()?;
            }
            kind::MEMORY => r.limits()?,
            kind::GLOBAL => {
                r.byte()?; // valtype
                r.byte()?; // mutability
            }
            _ => return Err(invalid("unknown import kind")),
        }
        Ok(Import {
            module,
            name,
            kind,
            type_index,
        })
    })
}

fn parse_exports(r: &mut Reader<'_>) -> LoadResult<Vec<Export>> {
    r.vec(|r| {
        let name = r.name()?;
        let kind = r.byte()?;
        let index = r.leb128()?;
        Ok(Export { name, kind, index })
    })
}

/// Cursor over a byte slice
struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn is_empty(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    fn byte(&mut self) -> LoadResult<u8> {
        let b = *self
            .bytes
            .get(self.pos)
            .ok_or_else(|| invalid("unexpected end of module"))?;
        self.pos += 1;
        Ok(b)
    }

    fn take(&mut self, len: usize) -> LoadResult<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.bytes.len())
            .ok_or_else(|| invalid("section extends past end of module"))?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    /// Unsigned LEB128, at most 5 bytes
    fn leb128(&mut self) -> LoadResult<u32> {
        let (value, used) = read_leb128(&self.bytes[self.pos.min(self.bytes.len())..])?;
        self.pos += used;
        Ok(value)
    }

    fn name(&mut self) -> LoadResult<String> {
        let len = self.leb128()? as usize;
        let raw = self.take(len)?;
        String::from_utf8(raw.to_vec()).map_err(|_| invalid("name is not UTF-8"))
    }

    fn limits(&mut self) -> LoadResult<()> {
        let flags = self.byte()?;
        self.leb128()?;
        if flags & 0x01 != 0 {
            self.leb128()?;
        }
        Ok(())
    }

    fn vec<T>(&mut self, mut item: impl FnMut(&mut Self) -> LoadResult<T>) -> LoadResult<Vec<T>> {
        let count = self.leb128()?;
        // Every item is at least one byte
        if count as usize > self.bytes.len() - self.pos {
            return Err(invalid("vector length exceeds section"));
        }
        (0..count).map(|_| item(self)).collect()
    }
}

/// Read an unsigned LEB128 value
fn read_leb128(bytes: &[u8]) -> LoadResult<(u32, usize)> {
    let mut result = 0u32;
    let mut shift = 0;

    for (i, &byte) in bytes.iter().take(5).enumerate() {
        result |= ((byte & 0x7F) as u32) << shift;
        if byte & 0x80 == 0 {
            return Ok((result, i + 1));
        }
        shift += 7;
    }

    Err(invalid("invalid LEB128"))
}
