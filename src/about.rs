pub const SSVIEW_DISPLAY_VERSION: &str = env!("SSVIEW_DISPLAY_VERSION");
pub const SSVIEW_BUILD_N: &str = env!("SSVIEW_BUILD_N");

pub fn version_cli_text() -> String {
    format!(
        "ssview {}\nBuild {}\nRNA secondary structure viewer engine",
        SSVIEW_DISPLAY_VERSION, SSVIEW_BUILD_N
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_text_names_build() {
        let text = version_cli_text();
        assert!(text.starts_with("ssview "));
        assert!(text.contains(&format!("Build {SSVIEW_BUILD_N}")));
    }
}
