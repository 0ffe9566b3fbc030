//! Module manifests: the declarative description of an installable WASM
//! module, independent of any particular compiled artifact.

use serde::{Deserialize, Serialize};
use stormstack_core::{ComponentTypeId, ModuleError, Result, StormError};
use stormstack_wasm::WasmModule;
use stormstack_wasm_host::CapabilitySet;

/// A single command a module declares it can handle.
///
/// `schema` is a JSON Schema fragment describing the shape of the
/// command's payload; the dispatcher rejects ingress commands whose
/// payload does not match before the sandbox ever sees them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeclaredCommand {
    /// Command name, matched against the command envelope's `command_name`.
    pub name: String,
    /// JSON Schema describing the accepted payload shape.
    pub schema: serde_json::Value,
}

impl DeclaredCommand {
    /// Declare a command with no payload constraints beyond "an object".
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            schema: serde_json::json!({ "type": "object" }),
        }
    }

    /// Declare a command with an explicit schema.
    #[must_use]
    pub fn with_schema(name: impl Into<String>, schema: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            schema,
        }
    }
}

/// A dependency on another module, optionally requiring a minimum version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleDependency {
    /// Name of the required module.
    pub name: String,
    /// Minimum version required, dotted-numeric (e.g. `"1.2.0"`). `None`
    /// accepts any installed version.
    pub min_version: Option<String>,
}

impl ModuleDependency {
    /// Depend on a module regardless of version.
    #[must_use]
    pub fn any(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            min_version: None,
        }
    }

    /// Depend on a module at or above `min_version`.
    #[must_use]
    pub fn min(name: impl Into<String>, min_version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            min_version: Some(min_version.into()),
        }
    }

    /// Whether `version` satisfies this dependency.
    #[must_use]
    pub fn satisfies(&self, version: &str) -> bool {
        match &self.min_version {
            None => true,
            Some(min) => compare_dotted_versions(version, min) >= 0,
        }
    }
}

/// Compare two dotted-numeric version strings (e.g. `"1.2.0"`). Missing
/// components compare as zero; non-numeric components compare as zero.
/// Returns negative/zero/positive like `Ord::cmp`.
fn compare_dotted_versions(a: &str, b: &str) -> i64 {
    let parse = |v: &str| -> Vec<u64> { v.split('.').map(|p| p.parse().unwrap_or(0)).collect() };
    let (pa, pb) = (parse(a), parse(b));
    let len = pa.len().max(pb.len());
    for i in 0..len {
        let x = pa.get(i).copied().unwrap_or(0);
        let y = pb.get(i).copied().unwrap_or(0);
        if x != y {
            return i64::from(x > y) * 2 - 1;
        }
    }
    0
}

/// Declarative manifest for an installable module.
///
/// This is what a module author ships alongside the compiled `.wasm`
/// artifact; the registry validates it against the artifact's actual
/// exports before the module is ever instantiated in a match.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleManifest {
    /// Module name, unique within a container.
    pub name: String,
    /// Module version, dotted-numeric.
    pub version: String,
    /// Human-readable description.
    pub description: String,
    /// Other modules this one depends on.
    pub dependencies: Vec<ModuleDependency>,
    /// Component types this module introduces. Attaching one of these to an
    /// entity from outside this module's own handlers is still permitted;
    /// the declaration exists so a container can reject ambiguous installs
    /// (two modules declaring the same component type) before matches start.
    #[serde(default)]
    pub declared_components: Vec<ComponentTypeId>,
    /// Commands this module's exports can handle, with their payload schema.
    #[serde(default)]
    pub declared_commands: Vec<DeclaredCommand>,
    /// Capabilities this module requests. The container grants a subset
    /// (possibly all, possibly none) at install time; a module must not
    /// assume every requested capability was granted.
    pub requested_capabilities: CapabilitySet,
    /// Exported function names the runtime will call (e.g. `"on_tick"`).
    /// Validated against the compiled module's actual exports.
    pub required_exports: Vec<String>,
}

impl ModuleManifest {
    /// Whether this manifest declares a handler for `command_name`.
    #[must_use]
    pub fn handles_command(&self, command_name: &str) -> bool {
        self.declared_commands.iter().any(|c| c.name == command_name)
    }

    /// Validate this manifest's `required_exports` against a compiled
    /// module's actual exports.
    ///
    /// # Errors
    ///
    /// Returns [`ModuleError::MissingExport`] naming the first export the
    /// manifest declares that the compiled module does not provide.
    pub fn validate_against(&self, module: &WasmModule) -> Result<()> {
        let exports = module.exported_functions();
        for required in &self.required_exports {
            if !exports.iter().any(|e| e == required) {
                return Err(StormError::Module(ModuleError::ManifestMismatch(format!(
                    "module '{}' manifest requires export '{required}' which the compiled artifact does not provide",
                    self.name
                ))));
            }
        }
        Ok(())
    }
}
