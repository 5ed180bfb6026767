use std::path::PathBuf;
use std::process::Command;

fn work_dir(name: &str) -> PathBuf {
    let dir = PathBuf::from("target").join("cli_smoke").join(name);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn pixform() -> Command {
    Command::new(env!("CARGO_BIN_EXE_pixform"))
}

#[test]
fn cli_writes_solid_png() {
    let dir = work_dir("solid");
    let out_path = dir.join("out.png");
    let _ = std::fs::remove_file(&out_path);

    let status = pixform()
        .args(["--width", "4", "--height", "3", "--expr", "return rgb(255, 0, 0);"])
        .arg("--out")
        .arg(&out_path)
        .status()
        .unwrap();
    assert!(status.success());

    let img = image::open(&out_path).unwrap().to_rgb8();
    assert_eq!(img.dimensions(), (4, 3));
    assert!(img.pixels().all(|p| p.0 == [255, 0, 0]));
}

#[test]
fn cli_transforms_an_input_with_opts_file_and_flags() {
    let dir = work_dir("invert");
    let in_path = dir.join("in.png");
    let opts_path = dir.join("opts.json");
    let out_path = dir.join("out.png");
    let _ = std::fs::remove_file(&out_path);

    image::RgbImage::from_fn(3, 2, |x, y| image::Rgb([(x * 40) as u8, (y * 90) as u8, 10]))
        .save(&in_path)
        .unwrap();
    // The file's source is replaced by the --rpnexpr flag.
    std::fs::write(
        &opts_path,
        r#"{ "expr": "return rgb(0, 0, 0);", "constants": { "top": 255 } }"#,
    )
    .unwrap();

    let status = pixform()
        .arg("--opts")
        .arg(&opts_path)
        .args(["--rpnexpr", "top top top rgb x y getp1 -", "--serial", "--out"])
        .arg(&out_path)
        .arg(&in_path)
        .status()
        .unwrap();
    assert!(status.success());

    let img = image::open(&out_path).unwrap().to_rgb8();
    assert_eq!(img.get_pixel(2, 1).0, [255 - 80, 255 - 90, 245]);
}

#[test]
fn cli_reports_compile_errors() {
    let dir = work_dir("bad");
    let out_path = dir.join("out.png");
    let _ = std::fs::remove_file(&out_path);

    let output = pixform()
        .args(["--width", "2", "--height", "2", "--rpnexpr", "x y getp1"])
        .arg("--out")
        .arg(&out_path)
        .output()
        .unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("compile error"), "{stderr}");
    assert!(!out_path.exists());
}
