//! The fixed, ordered command catalog derived from a [`BootConfig`].
//!
//! Every external collaborator the orchestrator calls is declared here:
//! the runtime probe, the two reinstall commands, the provisioning
//! downloads and the demo workloads.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::command::CommandSpec;
use crate::config::BootConfig;
use crate::health::DEPENDENCY_MODULES;

/// An artifact acquired into a well-known local directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisionTarget {
    /// Directory whose presence marks the artifact as provisioned.
    pub path: PathBuf,
    pub description: String,
    pub acquisition: CommandSpec,
}

/// A demo workload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DemoTarget {
    pub description: String,
    pub invocation: CommandSpec,
}

/// Dependency manifests reinstalled by the repair attempt, in order.
pub const REPAIR_MANIFESTS: [&str; 2] = ["requirements.txt", "requirements_gen3c.txt"];

/// Builds command specs for one configuration.
#[derive(Debug, Clone, Copy)]
pub struct Catalog<'a> {
    config: &'a BootConfig,
}

impl<'a> Catalog<'a> {
    pub fn new(config: &'a BootConfig) -> Self {
        Self { config }
    }

    fn python(&self) -> CommandSpec {
        CommandSpec::new(self.config.python.clone()).current_dir(&self.config.app_dir)
    }

    fn workload(&self) -> CommandSpec {
        self.python().envs(self.config.workload_env())
    }

    /// Runtime diagnostic: prints `key=value` lines parsed by the health checker.
    pub fn health_probe(&self) -> CommandSpec {
        self.python().arg("-c").arg(probe_script())
    }

    /// One reinstall command per dependency manifest.
    pub fn repair_commands(&self) -> Vec<CommandSpec> {
        REPAIR_MANIFESTS
            .into_iter()
            .map(|manifest| {
                self.python()
                    .args(["-m", "pip", "install", "--no-cache-dir", "-r", manifest])
            })
            .collect()
    }

    /// Checkpoints (three downloads sharing one gate) then the demo dataset.
    pub fn provision_targets(&self) -> Vec<ProvisionTarget> {
        let checkpoints = self.config.checkpoints_path();
        let checkpoints_arg = checkpoints.to_string_lossy().to_string();
        let tokenizer_dir = format!("{}/cosmos_predict1", checkpoints_arg);
        let demo_assets = self.config.demo_assets_path();

        vec![
            ProvisionTarget {
                path: checkpoints.clone(),
                description: "lyra checkpoint".to_string(),
                acquisition: self.workload().args([
                    "-m",
                    "scripts.download_lyra_checkpoints",
                    "--checkpoint_dir",
                    checkpoints_arg.as_str(),
                ]),
            },
            ProvisionTarget {
                path: checkpoints.clone(),
                description: "gen3c checkpoint".to_string(),
                acquisition: self.workload().args([
                    "-m",
                    "scripts.download_gen3c_checkpoints",
                    "--checkpoint_dir",
                    checkpoints_arg.as_str(),
                ]),
            },
            ProvisionTarget {
                path: checkpoints.clone(),
                description: "tokenizer checkpoint".to_string(),
                acquisition: self.workload().args([
                    "-m",
                    "scripts.download_tokenizer_checkpoints",
                    "--checkpoint_dir",
                    tokenizer_dir.as_str(),
                    "--tokenizer_types",
                    "CV8x8x8-720p",
                ]),
            },
            ProvisionTarget {
                path: demo_assets.clone(),
                description: "demo dataset".to_string(),
                acquisition: CommandSpec::new("huggingface-cli")
                    .current_dir(&self.config.app_dir)
                    .envs(self.config.workload_env())
                    .args([
                        "download",
                        "nvidia/Lyra-Testing-Example",
                        "--repo-type",
                        "dataset",
                        "--local-dir",
                    ])
                    .arg(demo_assets.to_string_lossy()),
            },
        ]
    }

    /// Static-scene then dynamic-scene sampling.
    pub fn demo_targets(&self) -> Vec<DemoTarget> {
        vec![
            DemoTarget {
                description: "static scene demo".to_string(),
                invocation: self
                    .workload()
                    .args(["sample.py", "--config", "configs/demo/lyra_static.yaml"]),
            },
            DemoTarget {
                description: "dynamic scene demo".to_string(),
                invocation: self
                    .workload()
                    .args(["sample.py", "--config", "configs/demo/lyra_dynamic.yaml"]),
            },
        ]
    }

    /// Interactive shell started in the application directory.
    pub fn interactive_shell(&self) -> CommandSpec {
        CommandSpec::new(self.config.shell.clone()).current_dir(&self.config.app_dir)
    }
}

/// Python source of the runtime probe.
fn probe_script() -> String {
    let modules = DEPENDENCY_MODULES
        .iter()
        .map(|(name, _)| format!("{:?}", name))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        r#"import importlib
try:
    import torch
    print("runtime=ok")
    print("runtime_version=" + torch.__version__)
    if torch.cuda.is_available():
        print("acceleration=" + torch.cuda.get_device_name(0))
    else:
        print("acceleration=none")
except Exception as exc:
    print("runtime=missing")
    print("acceleration=none")
    print("error=" + str(exc).splitlines()[0] if str(exc) else "error=import failed")
for name in [{modules}]:
    try:
        importlib.import_module(name)
        print("module:" + name + "=ok")
    except Exception:
        print("module:" + name + "=missing")
"#
    )
}
