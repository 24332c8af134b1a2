use std::fs::File;
use std::io::{ self, BufWriter, Write };
use std::path::Path;

use crate::color::Color;

/// Longest line a plain PPM file may contain.
const PPM_LINE_LIMIT: usize = 70;

/// A grid of traced colors, row-major with row 0 at the top.
///
/// Colors are stored unclamped; `save` and `write_ppm` clamp each channel
/// to `[0, 0.999999]` and scale to 8 bits.
#[derive(Clone, Default, Debug, PartialEq)]
pub struct Canvas {
    pub width: usize,
    pub height: usize,
    pixels: Vec<Color>,
}

impl Canvas {
    /// A black canvas of `width * height` pixels.
    pub fn new(width: usize, height: usize) -> Canvas {
        Canvas {
            width,
            height,
            pixels: vec![Color::black(); width * height]
        }
    }

    /// Writes a color at column `x`, row `y`. Out of bounds writes are
    /// ignored.
    pub fn write_pixel(&mut self, x: usize, y: usize, pixel: &Color) {
        if x >= self.width || y >= self.height {
            return;
        }

        self.pixels[(y * self.width) + x] = *pixel;
    }

    /// Reads the color at column `x`, row `y`, if it exists.
    pub fn read_pixel(&self, x: usize, y: usize) -> Option<Color> {
        if x >= self.width || y >= self.height {
            return None
        }

        Some(self.pixels[(y * self.width) + x])
    }

    /// Saves the canvas as a plain (P3) PPM file.
    pub fn save(&self, path: &Path) -> io::Result<()> {
        let mut out = BufWriter::new(File::create(path)?);
        self.write_ppm(&mut out)?;
        out.flush()
    }

    /// Writes plain PPM, wrapping lines before they pass 70 columns.
    pub fn write_ppm<W: Write>(&self, out: &mut W) -> io::Result<()> {
        writeln!(out, "P3")?;
        writeln!(out, "{} {}", self.width, self.height)?;
        writeln!(out, "255")?;

        for row in self.pixels.chunks(self.width.max(1)) {
            let mut col = 0;
            for pixel in row {
                let c = pixel.clamped();
                for channel in [c.r, c.g, c.b].iter() {
                    let token = ((channel * 256.0) as u32).to_string();

                    if col > 0 && col + 1 + token.len() > PPM_LINE_LIMIT {
                        writeln!(out)?;
                        col = 0;
                    }
                    if col > 0 {
                        write!(out, " ")?;
                        col += 1;
                    }

                    write!(out, "{}", token)?;
                    col += token.len();
                }
            }
            writeln!(out)?;
        }

        Ok(())
    }
}

/* Tests */

#[test]
fn ppm_header_and_pixels() {
    let mut canvas = Canvas::new(2, 1);
    canvas.write_pixel(0, 0, &Color::rgb(1.5, 0.0, 0.5));
    canvas.write_pixel(1, 0, &Color::rgb(-1.0, 0.25, 1.0));

    let mut buf = Vec::new();
    canvas.write_ppm(&mut buf).unwrap();
    let text = String::from_utf8(buf).unwrap();

    assert_eq!(text, "P3\n2 1\n255\n255 0 128 0 64 255\n");
}

#[test]
fn ppm_lines_stay_short() {
    let mut canvas = Canvas::new(10, 2);
    for y in 0..2 {
        for x in 0..10 {
            canvas.write_pixel(x, y, &Color::rgb(1.0, 0.8, 0.6));
        }
    }

    let mut buf = Vec::new();
    canvas.write_ppm(&mut buf).unwrap();
    let text = String::from_utf8(buf).unwrap();

    assert!(text.lines().all(|l| l.len() <= 70));
    assert_eq!(text.lines().skip(3).flat_map(|l| l.split_whitespace()).count(), 60);
}

#[test]
fn out_of_bounds_pixels() {
    let mut canvas = Canvas::new(4, 4);
    canvas.write_pixel(9, 9, &Color::white());

    assert_eq!(canvas.read_pixel(9, 9), None);
    assert_eq!(canvas.read_pixel(3, 3), Some(Color::black()));
}
