// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

/// Common arguments: package name and version
fn package_args(cmd: Command) -> Command {
    cmd.arg(Arg::new("name").required(true).help("Package name"))
        .arg(Arg::new("version").required(true).help("Package version"))
}

fn flag(name: &'static str, help: &'static str) -> Arg {
    Arg::new(name).long(name).action(ArgAction::SetTrue).help(help)
}

fn build_cli() -> Command {
    Command::new("set")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Set Contributors")
        .about("Source-based package manager with a cellar and a symlink farm")
        .arg(Arg::new("config").long("config").value_name("FILE").help("Configuration file"))
        .arg(Arg::new("cellar").long("cellar").value_name("DIR").help("Cellar root"))
        .arg(Arg::new("prefix").long("prefix").value_name("DIR").help("Shared prefix for links"))
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::SetTrue)
                .help("Verbose logging"),
        )
        .subcommand(
            Command::new("install")
                .about("Build and install a package from a recipe")
                .arg(Arg::new("recipe").required(true).help("Recipe file path or name in the recipe index"))
                .arg(flag("link", "Link the installed files into the prefix"))
                .arg(flag("reinstall", "Replace an existing install of the same version"))
                .arg(flag("keep-going", "Continue past failed build steps"))
                .arg(flag("keep-workspace", "Keep the build workspace for inspection"))
                .arg(
                    Arg::new("timeout")
                        .long("timeout")
                        .value_name("SECS")
                        .help("Kill build steps running longer than this many seconds"),
                ),
        )
        .subcommand(package_args(
            Command::new("uninstall").about("Unlink and remove an installed package"),
        ))
        .subcommand(package_args(
            Command::new("link").about("Link an installed package into the prefix"),
        ))
        .subcommand(package_args(
            Command::new("unlink").about("Remove an installed package's links from the prefix"),
        ))
        .subcommand(Command::new("list").about("List installed packages"))
        .subcommand(
            Command::new("check")
                .about("Parse and validate a recipe without building it")
                .arg(Arg::new("recipe").required(true).help("Recipe file path or name in the recipe index"))
                .arg(flag("print", "Print the recipe in canonical TOML form")),
        )
        .subcommand(
            Command::new("key-import")
                .about("Trust an OpenPGP certificate for signature verification")
                .arg(Arg::new("file").required(true).help("Certificate file")),
        )
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    let manifest_dir = match env::var("CARGO_MANIFEST_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(e) => {
            println!("cargo:warning=CARGO_MANIFEST_DIR not set: {}", e);
            return;
        }
    };
    let man_dir = manifest_dir.join("man");

    if let Err(e) = fs::create_dir_all(&man_dir) {
        println!("cargo:warning=Failed to create man directory: {}", e);
        return;
    }

    let man = Man::new(build_cli());
    let mut buffer = Vec::new();

    if let Err(e) = man.render(&mut buffer) {
        println!("cargo:warning=Failed to render man page: {}", e);
        return;
    }

    let man_path = man_dir.join("set.1");
    if let Err(e) = fs::write(&man_path, buffer) {
        println!("cargo:warning=Failed to write man page: {}", e);
    }
}
