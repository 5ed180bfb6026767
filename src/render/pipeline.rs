use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use rayon::prelude::*;

use crate::{
    eval::context::Context,
    expression::{
        ExprSource,
        bytecode::Program,
        compile,
        vm::{Frame, evaluate_in},
    },
    foundation::error::{PixformError, PixformResult},
    render::{
        output::{OutputImage, encode_pixel},
        source::SourceImage,
    },
};

/// Options of one transform invocation.
///
/// Deserializable from JSON; unknown keys are rejected.
#[derive(Clone, Debug, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct TransformOpts {
    /// Output width; defaults to the first input image's width.
    pub width: Option<u32>,
    /// Output height; defaults to the first input image's height.
    pub height: Option<u32>,
    /// Output channel count, `1..=4`.
    pub channels: u8,
    /// Extra named constants visible to the expression.
    pub constants: BTreeMap<String, f64>,
    /// Infix source. Exactly one of `expr` and `rpnexpr` must be set.
    pub expr: Option<String>,
    /// Postfix source.
    pub rpnexpr: Option<String>,
    /// Evaluate rows on a rayon pool.
    pub parallel: bool,
    /// Worker count for the pool; rayon's default when `None`.
    pub threads: Option<usize>,
}

impl Default for TransformOpts {
    fn default() -> Self {
        Self {
            width: None,
            height: None,
            channels: 3,
            constants: BTreeMap::new(),
            expr: None,
            rpnexpr: None,
            parallel: true,
            threads: None,
        }
    }
}

impl TransformOpts {
    /// Options for an infix expression, other fields defaulted.
    pub fn infix(src: impl Into<String>) -> Self {
        Self {
            expr: Some(src.into()),
            ..Self::default()
        }
    }

    /// Options for a postfix expression, other fields defaulted.
    pub fn rpn(src: impl Into<String>) -> Self {
        Self {
            rpnexpr: Some(src.into()),
            ..Self::default()
        }
    }

    fn source(&self) -> PixformResult<ExprSource<'_>> {
        match (&self.expr, &self.rpnexpr) {
            (Some(s), None) => Ok(ExprSource::Infix(s)),
            (None, Some(s)) => Ok(ExprSource::Rpn(s)),
            (Some(_), Some(_)) => Err(PixformError::usage(
                "'expr' and 'rpnexpr' are mutually exclusive",
            )),
            (None, None) => Err(PixformError::usage(
                "one of 'expr' or 'rpnexpr' is required",
            )),
        }
    }
}

/// A compiled transform: resolved geometry, context and program, ready to run.
///
/// All usage checks and compilation happen in [`TransformSession::new`]; [`TransformSession::run`]
/// only evaluates pixels.
#[derive(Debug)]
pub struct TransformSession {
    width: u32,
    height: u32,
    channels: u8,
    len: usize,
    parallel: bool,
    threads: Option<usize>,
    image_dims: Vec<(u32, u32)>,
    ctx: Context,
    program: Program,
}

impl TransformSession {
    /// Validate `opts`, build the context for `images` and compile the expression.
    #[tracing::instrument(skip(opts, images), fields(images = images.len()))]
    pub fn new(opts: &TransformOpts, images: &[&dyn SourceImage]) -> PixformResult<Self> {
        let src = opts.source()?;
        let first = images.first();
        let width = opts
            .width
            .or_else(|| first.map(|i| i.width()))
            .ok_or_else(|| PixformError::usage("width is required when no input image is given"))?;
        let height = opts
            .height
            .or_else(|| first.map(|i| i.height()))
            .ok_or_else(|| {
                PixformError::usage("height is required when no input image is given")
            })?;
        if width == 0 || height == 0 {
            return Err(PixformError::usage(format!(
                "output size must be non-zero, got {width}x{height}"
            )));
        }
        if !(1..=4).contains(&opts.channels) {
            return Err(PixformError::usage(format!(
                "channels must be 1..=4, got {}",
                opts.channels
            )));
        }
        if opts.threads == Some(0) {
            return Err(PixformError::usage("'threads' must be >= 1 when set"));
        }
        let len = (width as usize)
            .checked_mul(height as usize)
            .and_then(|n| n.checked_mul(usize::from(opts.channels)))
            .filter(|&n| n <= isize::MAX as usize)
            .ok_or_else(|| PixformError::usage("output size too large"))?;

        let image_dims: Vec<(u32, u32)> = images.iter().map(|i| (i.width(), i.height())).collect();
        tracing::debug!(width, height, channels = opts.channels, ?image_dims, "resolved geometry");

        let ctx = Context::build(width, height, &image_dims, &opts.constants)?;
        let program = compile(&src, &ctx)?;

        Ok(Self {
            width,
            height,
            channels: opts.channels,
            len,
            parallel: opts.parallel,
            threads: opts.threads,
            image_dims,
            ctx,
            program,
        })
    }

    /// The compiled program.
    pub fn program(&self) -> &Program {
        &self.program
    }

    /// The constant table the program was compiled against.
    pub fn context(&self) -> &Context {
        &self.ctx
    }

    /// Resolved output `(width, height)`.
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Evaluate every output pixel.
    ///
    /// `images` must have the same count and sizes as at construction. When `cancel` is set
    /// between rows the run stops with [`PixformError::Cancelled`] and no output.
    pub fn run(
        &self,
        images: &[&dyn SourceImage],
        cancel: Option<&AtomicBool>,
    ) -> PixformResult<OutputImage> {
        let dims_match = images.len() == self.image_dims.len()
            && images
                .iter()
                .zip(&self.image_dims)
                .all(|(i, &(w, h))| i.width() == w && i.height() == h);
        if !dims_match {
            return Err(PixformError::usage(
                "input images differ from those the session was compiled for",
            ));
        }

        let mut out = OutputImage::zeroed(self.width, self.height, self.channels, self.len);
        let row_bytes = out.row_bytes();
        let channels = usize::from(self.channels);

        let render_row = |frame: &mut Frame, y: usize, row: &mut [u8]| -> PixformResult<()> {
            if cancel.is_some_and(|c| c.load(Ordering::Relaxed)) {
                return Err(PixformError::Cancelled);
            }
            for (x, px) in row.chunks_exact_mut(channels).enumerate() {
                let c = evaluate_in(frame, &self.program, &self.ctx, x as f64, y as f64, images)?;
                encode_pixel(c, px);
            }
            Ok(())
        };

        if self.parallel {
            let pool = build_thread_pool(self.threads)?;
            pool.install(|| {
                out.data
                    .par_chunks_mut(row_bytes)
                    .enumerate()
                    .try_for_each_init(
                        || Frame::new(&self.program),
                        |frame, (y, row)| render_row(frame, y, row),
                    )
            })?;
        } else {
            let mut frame = Frame::new(&self.program);
            for (y, row) in out.data.chunks_mut(row_bytes).enumerate() {
                render_row(&mut frame, y, row)?;
            }
        }

        Ok(out)
    }
}

/// Compile `opts` and evaluate it over `images`.
#[tracing::instrument(skip(opts, images), fields(images = images.len()))]
pub fn transform(opts: &TransformOpts, images: &[&dyn SourceImage]) -> PixformResult<OutputImage> {
    TransformSession::new(opts, images)?.run(images, None)
}

/// Like [`transform`], checking `cancel` before each row.
#[tracing::instrument(skip(opts, images, cancel), fields(images = images.len()))]
pub fn transform_with_cancel(
    opts: &TransformOpts,
    images: &[&dyn SourceImage],
    cancel: &AtomicBool,
) -> PixformResult<OutputImage> {
    TransformSession::new(opts, images)?.run(images, Some(cancel))
}

fn build_thread_pool(threads: Option<usize>) -> PixformResult<rayon::ThreadPool> {
    let mut builder = rayon::ThreadPoolBuilder::new();
    if let Some(n) = threads {
        builder = builder.num_threads(n);
    }
    builder
        .build()
        .map_err(|e| PixformError::Other(anyhow::anyhow!("failed to build rayon thread pool: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbaImage;

    fn checker() -> RgbaImage {
        RgbaImage::from_fn(5, 4, |x, y| {
            image::Rgba([(x * 50) as u8, (y * 60) as u8, ((x + y) % 2 * 255) as u8, 255])
        })
    }

    #[test]
    fn size_defaults_to_first_image() {
        let img = checker();
        let s = TransformSession::new(&TransformOpts::rpn("x y getp1"), &[&img]).unwrap();
        assert_eq!(s.size(), (5, 4));
        assert_eq!(s.program().arity(), 1);
        assert_eq!(s.context().get("cx1"), Some(2.5));
    }

    #[test]
    fn usage_errors_are_raised_before_compiling() {
        let img = checker();
        let cases = [
            TransformOpts::default(),
            TransformOpts {
                expr: Some("return x".to_owned()),
                ..TransformOpts::rpn("x")
            },
            TransformOpts::rpn("x"),
            TransformOpts {
                width: Some(0),
                height: Some(3),
                ..TransformOpts::rpn("x")
            },
            TransformOpts {
                channels: 5,
                ..TransformOpts::rpn("x")
            },
            TransformOpts {
                threads: Some(0),
                ..TransformOpts::rpn("x")
            },
        ];
        for (i, opts) in cases.iter().enumerate() {
            // Only the no-size case lacks an image.
            let images: Vec<&dyn SourceImage> = if i == 2 { vec![] } else { vec![&img] };
            let err = TransformSession::new(opts, &images).unwrap_err();
            assert!(err.is_usage(), "case {i}: {err}");
        }
    }

    #[test]
    fn oversized_output_is_a_usage_error() {
        let opts = TransformOpts {
            width: Some(u32::MAX),
            height: Some(u32::MAX),
            channels: 4,
            ..TransformOpts::rpn("x")
        };
        let err = transform(&opts, &[]).unwrap_err();
        assert!(err.is_usage(), "{err}");
        assert!(err.to_string().contains("output size too large"), "{err}");
    }

    #[test]
    fn compile_errors_surface_as_compile() {
        let opts = TransformOpts {
            width: Some(2),
            height: Some(2),
            ..TransformOpts::infix("return getp2(x, y);")
        };
        let img = checker();
        let err = transform(&opts, &[&img]).unwrap_err();
        assert!(matches!(err, PixformError::Compile(_)), "{err}");
    }

    #[test]
    fn serial_and_parallel_runs_agree() {
        let img = checker();
        let base = TransformOpts {
            channels: 4,
            ..TransformOpts::infix(
                "p = getp1(x * 0.7, h1 - y);\n\
                 return p * rgb(x / w * 255, 200, 100) + rgba(0, 0, 0, y);",
            )
        };
        let serial = transform(
            &TransformOpts {
                parallel: false,
                ..base.clone()
            },
            &[&img],
        )
        .unwrap();
        let parallel = transform(
            &TransformOpts {
                threads: Some(3),
                ..base
            },
            &[&img],
        )
        .unwrap();
        assert_eq!(serial, parallel);
    }

    #[test]
    fn raised_cancel_flag_aborts_without_output() {
        let cancel = AtomicBool::new(true);
        let opts = TransformOpts {
            width: Some(8),
            height: Some(8),
            ..TransformOpts::rpn("x y 0 rgb")
        };
        let err = transform_with_cancel(&opts, &[], &cancel).unwrap_err();
        assert!(matches!(err, PixformError::Cancelled));
    }

    #[test]
    fn session_rejects_different_images_at_run_time() {
        let img = checker();
        let other = RgbaImage::new(2, 2);
        let s = TransformSession::new(&TransformOpts::rpn("x y getp1"), &[&img]).unwrap();
        assert!(s.run(&[&other], None).unwrap_err().is_usage());
        assert!(s.run(&[], None).unwrap_err().is_usage());
        assert_eq!(s.run(&[&img], None).unwrap().data.len(), 5 * 4 * 3);
    }

    #[test]
    fn opts_parse_from_json() {
        let opts: TransformOpts = serde_json::from_str(
            r#"{ "width": 4, "height": 2, "channels": 1, "constants": { "k": 2 }, "rpnexpr": "x k *" }"#,
        )
        .unwrap();
        assert_eq!(opts.channels, 1);
        assert!(opts.parallel);
        let out = transform(&opts, &[]).unwrap();
        assert_eq!(out.pixel(3, 1), Some(&[6u8][..]));

        let bad = serde_json::from_str::<TransformOpts>(r#"{ "widht": 4 }"#);
        assert!(bad.is_err());
    }
}
