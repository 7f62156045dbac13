/*!
 * Common test utilities for the narrador test suite
 */

use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

use narrador::app_config::{Config, SynthesisProvider};
use narrador::app_controller::Controller;
use narrador::job::MemoryProgressStore;
use narrador::providers::mock::MockSynthesizer;

/// Short Portuguese story used across the integration tests
pub const SAMPLE_STORY: &str = "CAPÍTULO I - O COMEÇO

Era uma vez um menino que morava perto do rio. Todos os dias ele acordava cedo.
O Dr. Silva, seu vizinho, tinha 25 anos e ganhou R$ 1000 na feira.

Naquela manhã o menino chegou em 1º lugar na corrida da escola. A mãe ficou feliz.";

/// Creates a temporary directory for test files
pub fn create_temp_dir() -> Result<TempDir> {
    init_test_logging();
    Ok(TempDir::new()?)
}

/// Route library logs through the test harness; set RUST_LOG to see them
pub fn init_test_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Creates a test file with the given content in the specified directory
pub fn create_test_file(dir: &Path, filename: &str, content: &str) -> Result<PathBuf> {
    let file_path = dir.join(filename);
    fs::write(&file_path, content)?;
    Ok(file_path)
}

/// Mock-provider configuration writing artifacts to `output_dir`
pub fn test_config(output_dir: &Path) -> Config {
    let mut config = Config::default();
    config.synthesis.provider = SynthesisProvider::Mock;
    config.segmentation.max_unit_size = 80;
    config.synthesis.common.max_attempts = 2;
    config.synthesis.common.retry_backoff_ms = 1;
    config.synthesis.common.max_backoff_ms = 1;
    config.synthesis.common.retry_jitter = false;
    config.output.output_dir = Some(output_dir.to_path_buf());
    config
}

/// Controller wired to a mock synthesizer and an in-memory store
pub fn test_controller(
    config: Config,
    synthesizer: MockSynthesizer,
    store: Arc<MemoryProgressStore>,
    segments_root: &Path,
) -> Controller {
    Controller::with_components(config, Arc::new(synthesizer), store, segments_root)
}
