use crate::{LaunchLayout, PORT_FILE_ENV, SidecarConfig, WorkerLaunch};

use std::path::PathBuf;

use googletest::assert_that;
use googletest::prelude::{anything, eq, err, none, some};

#[test]
fn given_development_layout_when_resolve_then_program_and_args_as_configured() {
    let mut config = SidecarConfig::default();
    config.worker.program = String::from("python3");
    config.worker.args = vec![String::from("python-service/main.py")];
    config.handshake.directory = Some(PathBuf::from("/run/sidecar"));

    let launch = config.resolve_launch().unwrap();

    assert_that!(launch.program, eq(&PathBuf::from("python3")));
    assert_that!(launch.args, eq(&vec![String::from("python-service/main.py")]));
    assert_that!(launch.working_dir, none());
    assert_that!(
        launch.env.get(PORT_FILE_ENV).cloned(),
        some(eq("/run/sidecar/sidecar-worker-port.txt"))
    );
    assert_that!(
        launch.env.get("PYTHONUNBUFFERED").cloned(),
        some(eq("1"))
    );
}

#[test]
fn given_packaged_layout_when_resolve_then_paths_joined_under_root() {
    let mut config = SidecarConfig::default();
    config.worker.layout = LaunchLayout::Packaged;
    config.worker.packaged_root = Some(PathBuf::from("/opt/app/resources"));
    config.worker.packaged_program = Some(String::from("python-runtime/bin/python3"));
    config.worker.packaged_args = vec![String::from("{root}/python-service/main.py")];

    let launch = config.resolve_launch().unwrap();

    assert_that!(
        launch.program,
        eq(&PathBuf::from("/opt/app/resources/python-runtime/bin/python3"))
    );
    assert_that!(
        launch.args,
        eq(&vec![String::from("/opt/app/resources/python-service/main.py")])
    );
    assert_that!(
        launch.working_dir,
        some(eq(&PathBuf::from("/opt/app/resources")))
    );
}

#[test]
fn given_packaged_layout_without_packaged_args_when_resolve_then_dev_args_reused() {
    let mut config = SidecarConfig::default();
    config.worker.layout = LaunchLayout::Packaged;
    config.worker.packaged_root = Some(PathBuf::from("/opt/app"));
    config.worker.program = String::from("bin/worker");
    config.worker.args = vec![String::from("--quiet")];

    let launch = config.resolve_launch().unwrap();

    assert_that!(launch.program, eq(&PathBuf::from("/opt/app/bin/worker")));
    assert_that!(launch.args, eq(&vec![String::from("--quiet")]));
}

#[test]
fn given_packaged_layout_without_root_when_resolve_then_error() {
    let mut config = SidecarConfig::default();
    config.worker.layout = LaunchLayout::Packaged;

    assert_that!(config.resolve_launch(), err(anything()));
}

#[test]
fn given_builder_when_display_command_then_program_and_args_joined() {
    let launch = WorkerLaunch::new("/bin/sh").arg("-c").arg("exit 0");

    assert_that!(launch.display_command(), eq("/bin/sh -c exit 0"));
}
