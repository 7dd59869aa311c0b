//! Root filesystem image format conversion.

use anyhow::{bail, Result};
use klab_env::Env;
use klab_runner::CmdSpec;

const QEMU_IMG_BASENAME: &str = "qemu-img";

/// Converts the Buildroot raw image to qcow2, or back with `reverse`.
/// `prebuilt` uses the qemu-img on PATH instead of the built one.
///
/// A failed conversion is a hard error at this call site: nothing downstream
/// can work with a half-written image.
pub fn raw_to_qcow2(env: &Env, prebuilt: bool, reverse: bool) -> Result<()> {
    let qemu_img = if prebuilt {
        QEMU_IMG_BASENAME.to_string()
    } else {
        env.build.qemu_img_executable.display().to_string()
    };
    let (infmt, outfmt) = if reverse {
        ("qcow2", "raw")
    } else {
        ("raw", "qcow2")
    };
    let (infile, outfile) = if reverse {
        (&env.build.qcow2_file, &env.build.rootfs_raw_file)
    } else {
        (&env.build.rootfs_raw_file, &env.build.qcow2_file)
    };

    let argv = vec![
        qemu_img,
        // Keep qemu-img from dropping trace files next to the image.
        "-T".to_string(),
        "pr_manager_run,file=/dev/null".to_string(),
        "convert".to_string(),
        "-f".to_string(),
        infmt.to_string(),
        "-O".to_string(),
        outfmt.to_string(),
        infile.display().to_string(),
        outfile.display().to_string(),
    ];
    let code = klab_runner::run_cmd(&CmdSpec::new(argv))?;
    if code != 0 {
        bail!("qemu-img convert failed with status {code}");
    }
    Ok(())
}
