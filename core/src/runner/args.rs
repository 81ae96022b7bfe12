use std::ffi::OsString;
use std::path::Path;

use super::types::{RunKind, RunRequest};

/// Positional arguments handed to nvmecmd for one request.
///
/// Every kind starts with `<read-template> --nvme <drive> --dir <session>`;
/// compare and verify runs append their auxiliary file.
pub fn build_tool_args(req: &RunRequest, read_template: &Path, session_dir: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        read_template.as_os_str().to_owned(),
        "--nvme".into(),
        req.drive_id.clone().into(),
        "--dir".into(),
        session_dir.as_os_str().to_owned(),
    ];

    let flag = match req.kind {
        RunKind::CompareInfo => Some("--compare"),
        RunKind::VerifyInfo => Some("--rules"),
        RunKind::ReadInfo | RunKind::Dashboard => None,
    };

    if let (Some(flag), Some(aux)) = (flag, req.aux_file.as_deref()) {
        args.push(flag.into());
        args.push(aux.as_os_str().to_owned());
    }

    args
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strs(args: &[OsString]) -> Vec<String> {
        args.iter().map(|a| a.to_string_lossy().into_owned()).collect()
    }

    #[test]
    fn read_and_dashboard_share_the_base_template() {
        let tpl = Path::new("/opt/nvmecmd/read.cmd.json");
        let dir = Path::new("/logs/ReadInfo/2024.01.02-03.04.05.006");
        let expected = vec![
            "/opt/nvmecmd/read.cmd.json",
            "--nvme",
            "0",
            "--dir",
            "/logs/ReadInfo/2024.01.02-03.04.05.006",
        ];
        assert_eq!(strs(&build_tool_args(&RunRequest::read("0"), tpl, dir)), expected);
        assert_eq!(
            strs(&build_tool_args(&RunRequest::dashboard("0"), tpl, dir)),
            expected
        );
    }

    #[test]
    fn compare_appends_snapshot() {
        let args = build_tool_args(
            &RunRequest::compare("1", "/ref/nvme.info.json"),
            Path::new("read.cmd.json"),
            Path::new("/s"),
        );
        assert_eq!(
            strs(&args)[5..],
            ["--compare".to_string(), "/ref/nvme.info.json".to_string()]
        );
    }

    #[test]
    fn verify_appends_rules() {
        let args = build_tool_args(
            &RunRequest::verify("1", "/rules/default.rules.json"),
            Path::new("read.cmd.json"),
            Path::new("/s"),
        );
        assert_eq!(args.len(), 7);
        assert_eq!(args[5], OsString::from("--rules"));
        assert_eq!(args[6], OsString::from("/rules/default.rules.json"));
    }
}
