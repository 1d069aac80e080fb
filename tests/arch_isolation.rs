//! Builds for different toolchains never share outputs.

mod common;

use common::{FakeToolchain, config, project, run};
use kiln::build::{ArchContext, ArchStore, clean_store};

const MANIFEST: &str = r#"
[package]
name = "blink"

[[library]]
name = "m"
kind = "binary"
path = "libs/m/lib"
include = "libs/m/include"
"#;

fn blink() -> tempfile::TempDir {
    project(&[
        ("src/main.c", "#include <m/m.h>\n"),
        ("src/led.S", "; led\n"),
        ("libs/m/include/m.h", "\n"),
    ])
}

#[test]
fn test_each_triple_gets_its_own_store() {
    let dir = blink();
    let cfg = config(MANIFEST);
    let avr = FakeToolchain::new("avr");
    let arm = FakeToolchain::new("arm-none-eabi");

    run(dir.path(), &cfg, &avr).unwrap();
    run(dir.path(), &cfg, &arm).unwrap();

    // The second toolchain reuses nothing from the first.
    assert_eq!(arm.calls("compile"), vec!["led.S", "main.c"]);
    assert_eq!(arm.calls("link"), vec!["blink.elf"]);

    for triple in ["avr", "arm-none-eabi"] {
        let store = dir.path().join("bin").join(triple);
        assert!(store.join("src/main.o").is_file());
        assert!(store.join("src/led.o").is_file());
        assert!(store.join("blink.elf").is_file());
        assert!(store.join("include/m/m.h").is_file());
    }
}

#[test]
fn test_switching_back_is_up_to_date() {
    let dir = blink();
    let cfg = config(MANIFEST);
    let avr = FakeToolchain::new("avr");
    let arm = FakeToolchain::new("arm-none-eabi");

    run(dir.path(), &cfg, &avr).unwrap();
    run(dir.path(), &cfg, &arm).unwrap();
    avr.reset();

    let report = run(dir.path(), &cfg, &avr).unwrap();
    assert!(report.executed.is_empty());
    assert_eq!(avr.total(), 0);
}

#[test]
fn test_assembly_record_is_written() {
    let dir = blink();
    let cfg = config(MANIFEST);
    let avr = FakeToolchain::new("avr");
    run(dir.path(), &cfg, &avr).unwrap();

    let record = dir.path().join("bin/avr/src/led.d");
    let text = std::fs::read_to_string(record).unwrap();
    assert!(text.contains("led.S"));
}

#[test]
fn test_clean_only_touches_one_triple() {
    let dir = blink();
    let cfg = config(MANIFEST);
    let avr = FakeToolchain::new("avr");
    let arm = FakeToolchain::new("arm-none-eabi");
    run(dir.path(), &cfg, &avr).unwrap();
    run(dir.path(), &cfg, &arm).unwrap();

    let store = ArchStore::new(
        dir.path(),
        &cfg.bin_root(dir.path()),
        ArchContext::new("avr"),
    );
    assert!(clean_store(&store).unwrap());

    assert!(!dir.path().join("bin/avr").exists());
    assert!(dir.path().join("bin/arm-none-eabi/blink.elf").is_file());
    assert!(dir.path().join("libs/m/include/m.h").is_file());

    let report = run(dir.path(), &cfg, &arm).unwrap();
    assert!(report.executed.is_empty());
}
