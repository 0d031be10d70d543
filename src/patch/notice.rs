//! Human-facing files produced alongside a staged patch

use std::path::{Path, PathBuf};

use chrono::Local;

use crate::config::{EXTRACTED_DIR_NAME, INSTRUCTIONS_FILE_NAME};

const RULE: &str = "==================================================";

pub fn ready_notice_file_name(product: &str, version: &str) -> String {
    format!("PATCH_READY_{}_{}.txt", product, version)
}

/// Write the installation guide into the version directory
pub fn write_instructions(
    version_dir: &Path,
    product: &str,
    version: &str,
    extract_dir: &Path,
) -> std::io::Result<PathBuf> {
    let path = version_dir.join(INSTRUCTIONS_FILE_NAME);
    let extract_dir = extract_dir.display();
    let content = format!(
        "{RULE}
Patch installation instructions
{RULE}

Product:    {product}
Version:    {version}
Downloaded: {downloaded}

To install:
1. Close {product} if it is running
2. Open {extract_dir}
3. Copy every file from that folder into the {product} installation directory
4. Start {product} again

Back up the current {product} files before installing.
{RULE}
",
        downloaded = Local::now().format("%Y-%m-%d %H:%M:%S"),
    );

    std::fs::write(&path, content)?;
    Ok(path)
}

/// Drop a notification file in `notification_dir` telling the operator a
/// patch is waiting
pub fn write_ready_notice(
    notification_dir: &Path,
    product: &str,
    version: &str,
    version_dir: &Path,
) -> std::io::Result<PathBuf> {
    std::fs::create_dir_all(notification_dir)?;
    let path = notification_dir.join(ready_notice_file_name(product, version));
    let version_dir = version_dir.display();
    let content = format!(
        "{RULE}
Patch ready for installation
{RULE}

Product:  {product}
Version:  {version}
Ready at: {ready}
Location: {version_dir}

Next steps:
1. Close {product} if it is running
2. Open {version_dir} and read {INSTRUCTIONS_FILE_NAME}
3. Copy the files from the '{EXTRACTED_DIR_NAME}' folder into the {product} installation
4. Start {product} again
5. Delete this file once the patch is installed
{RULE}
",
        ready = Local::now().format("%Y-%m-%d %H:%M:%S"),
    );

    std::fs::write(&path, content)?;
    Ok(path)
}
