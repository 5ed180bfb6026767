use std::collections::BTreeMap;

use image::{Rgba, RgbaImage};
use pixform::{
    CompileErrorKind, Context, ExprSource, PixformError, SourceImage, TransformOpts, compile,
    evaluate, transform,
};

fn gradient(w: u32, h: u32) -> RgbaImage {
    RgbaImage::from_fn(w, h, |x, y| {
        Rgba([(x * 25) as u8, (y * 25) as u8, ((x * y) % 256) as u8, 255])
    })
}

#[test]
fn identity_sampling_reproduces_input() {
    let img = gradient(10, 10);
    let opts = TransformOpts {
        channels: 4,
        ..TransformOpts::rpn("x y getp1")
    };
    let out = transform(&opts, &[&img]).unwrap();
    assert_eq!((out.width, out.height), (10, 10));
    assert_eq!(out.data, img.as_raw().clone());
}

#[test]
fn solid_red_without_inputs() {
    let opts = TransformOpts {
        width: Some(4),
        height: Some(4),
        ..TransformOpts::infix("return rgb(255,0,0)")
    };
    let out = transform(&opts, &[]).unwrap();
    assert_eq!(out.channels, 3);
    assert_eq!(out.data, [255u8, 0, 0].repeat(16));
}

#[test]
fn near_white_pixels_are_replaced() {
    // (pixel, replaced)
    let fixture: [([u8; 3], bool); 8] = [
        ([255, 255, 255], true),
        ([250, 250, 248], true),
        ([245, 245, 245], true),
        ([240, 240, 240], false),
        ([255, 200, 200], false),
        ([255, 0, 0], false),
        ([0, 0, 0], false),
        ([30, 90, 200], false),
    ];
    let img = RgbaImage::from_fn(4, 2, |x, y| {
        let [r, g, b] = fixture[(y * 4 + x) as usize].0;
        Rgba([r, g, b, 255])
    });
    let expected: Vec<u8> = fixture
        .iter()
        .flat_map(|&(px, replaced)| if replaced { [128, 128, 255] } else { px })
        .collect();

    let rpn = "x y getp1 !pix @pix value 0.96 gt @pix sat 0.1 lt and 128 128 255 rgb @pix ifp";
    let out = transform(&TransformOpts::rpn(rpn), &[&img]).unwrap();
    assert_eq!(out.data, expected);

    let infix = "pix = getp1(x, y);\n\
                 return ifp(value(pix) > 0.96 && sat(pix) < 0.1, rgb(128, 128, 255), pix);";
    let out = transform(&TransformOpts::infix(infix), &[&img]).unwrap();
    assert_eq!(out.data, expected);
}

#[test]
fn sampling_an_unsupplied_image_is_a_compile_error() {
    let img = gradient(3, 3);
    let err = transform(&TransformOpts::rpn("x y getp2"), &[&img]).unwrap_err();
    match err {
        PixformError::Compile(e) => {
            assert_eq!(e.kind, CompileErrorKind::MissingImage);
            assert_eq!(e.offset, 4);
        }
        other => panic!("expected compile error, got {other}"),
    }
}

#[test]
fn guarded_arithmetic_never_fails() {
    let opts = TransformOpts {
        width: Some(3),
        height: Some(1),
        channels: 1,
        ..TransformOpts::infix("return if(x == 0, 1 / 0, if(x == 1, 0 ** -1, 7 % 0));")
    };
    let out = transform(&opts, &[]).unwrap();
    assert_eq!(out.data, [255, 255, 0]);
}

#[test]
fn out_of_bounds_samples_clamp_to_edges() {
    let img = gradient(4, 4);
    let opts = TransformOpts {
        width: Some(2),
        height: Some(1),
        channels: 4,
        ..TransformOpts::infix("return getp1(if(x < 0.5, -10, 99.7), 1.9);")
    };
    let out = transform(&opts, &[&img]).unwrap();
    assert_eq!(out.pixel(0, 0), Some(&img.get_pixel(0, 1).0[..]));
    assert_eq!(out.pixel(1, 0), Some(&img.get_pixel(3, 1).0[..]));
}

#[test]
fn caller_constants_reach_the_expression() {
    let mut constants = BTreeMap::new();
    constants.insert("level".to_owned(), 42.0);
    let opts = TransformOpts {
        width: Some(2),
        height: Some(2),
        channels: 1,
        constants,
        ..TransformOpts::rpn("level")
    };
    let out = transform(&opts, &[]).unwrap();
    assert_eq!(out.data, [42; 4]);

    let mut bad = BTreeMap::new();
    bad.insert("cx".to_owned(), 1.0);
    let opts = TransformOpts {
        width: Some(2),
        height: Some(2),
        constants: bad,
        ..TransformOpts::rpn("x")
    };
    assert!(transform(&opts, &[]).unwrap_err().is_usage());
}

#[test]
fn compilation_and_evaluation_are_deterministic() {
    let img = gradient(6, 6);
    let images: [&dyn SourceImage; 1] = [&img];
    let ctx = Context::build(6, 6, &[(6, 6)], &BTreeMap::new()).unwrap();
    let src = ExprSource::Infix(
        "d = distance(x, y, cx, cy);\n\
         c = getp1(w1 - x, y);\n\
         return ifp(d < 2, hsv(d * 90, 0.5, 1), c + rgb(d, d, d));",
    );
    let a = compile(&src, &ctx).unwrap();
    let b = compile(&src, &ctx).unwrap();
    assert_eq!(a.fingerprint(), b.fingerprint());
    assert_eq!(a.to_string(), b.to_string());

    for y in 0..6 {
        for x in 0..6 {
            let (x, y) = (f64::from(x), f64::from(y));
            let first = evaluate(&a, &ctx, x, y, &images).unwrap();
            let again = evaluate(&b, &ctx, x, y, &images).unwrap();
            assert_eq!(first, again);
        }
    }
}

#[test]
fn different_sources_fingerprint_differently() {
    let ctx = Context::build(2, 2, &[], &BTreeMap::new()).unwrap();
    let a = compile(&ExprSource::Rpn("x y 0 rgb"), &ctx).unwrap();
    let b = compile(&ExprSource::Rpn("y x 0 rgb"), &ctx).unwrap();
    assert_ne!(a.fingerprint(), b.fingerprint());
}

#[test]
fn color_round_trips_through_channel_accessors() {
    let img = gradient(5, 5);
    let opts = TransformOpts {
        channels: 4,
        ..TransformOpts::infix("c = getp1(x, y); return rgba(red(c), green(c), blue(c), alpha(c));")
    };
    let out = transform(&opts, &[&img]).unwrap();
    assert_eq!(out.data, img.as_raw().clone());
}

#[test]
fn grey_outputs_use_luma() {
    let img = RgbaImage::from_pixel(1, 1, Rgba([200, 100, 50, 77]));
    let opts = TransformOpts {
        channels: 2,
        ..TransformOpts::rpn("0 0 getp1")
    };
    let out = transform(&opts, &[&img]).unwrap();
    assert_eq!(out.data, [124, 77]);
}
