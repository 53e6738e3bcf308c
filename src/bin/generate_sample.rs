//! Writes `sample_galah.fits`: a synthetic GALAH-style file with science,
//! error, unreduced and bad-pixel HDUs sharing one wavelength grid.

use anyhow::{Context, Result};

use fits_spectra::fits::header::Header;
use fits_spectra::fits::{FitsFile, Hdu, ImageData};

fn gaussian(x: f64, mu: f64, sigma: f64, amplitude: f64) -> f64 {
    amplitude * (-(x - mu).powi(2) / (2.0 * sigma.powi(2))).exp()
}

/// Flat continuum with absorption lines (negative amplitudes) and noise.
fn generate_spectrum(
    wavelengths: &[f64],
    continuum: f64,
    lines: &[(f64, f64, f64)],
    noise_level: f64,
    rng: &mut SimpleRng,
) -> Vec<f64> {
    wavelengths
        .iter()
        .map(|&wl| {
            let signal: f64 = lines
                .iter()
                .map(|&(mu, sigma, amp)| gaussian(wl, mu, sigma, amp))
                .sum();
            continuum + signal + rng.gauss(0.0, noise_level)
        })
        .collect()
}

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }
}

const CRVAL1: f64 = 4715.0;
const CDELT1: f64 = 0.05;
const POINTS: usize = 4000;

fn image(extname: &str, values: Vec<f64>) -> Hdu {
    let mut header = Header::new();
    header.insert("EXTNAME", extname);
    header.insert("CRPIX1", 1.0);
    header.insert("CRVAL1", CRVAL1);
    header.insert("CDELT1", CDELT1);
    header.insert("CUNIT1", "Angstrom");
    Hdu::new(header, Some(ImageData::vector(values)))
}

fn main() -> Result<()> {
    env_logger::init();
    let mut rng = SimpleRng::new(42);

    let wavelengths: Vec<f64> = (0..POINTS).map(|i| CRVAL1 + i as f64 * CDELT1).collect();
    // H-beta and the Mg b triplet, roughly where GALAH's blue arm sees them
    let lines = [
        (4861.3, 0.6, -0.55),
        (4867.0, 0.3, -0.2),
        (4871.3, 0.3, -0.25),
        (4890.8, 0.25, -0.15),
    ];
    let noise = 0.02;

    let science = generate_spectrum(&wavelengths, 1.0, &lines, noise, &mut rng);
    let unreduced = generate_spectrum(&wavelengths, 850.0, &lines, 25.0, &mut rng);
    let badpix: Vec<f64> = (0..POINTS)
        .map(|_| if rng.next_f64() < 0.01 { 1.0 } else { 0.0 })
        .collect();

    let mut primary = image("normalised spectrum", science);
    primary.header.insert("OBJECT", "SYNTH-0001");
    primary.header.insert("REFERENC", "galah synthetic sample");
    primary.header.insert("INSTRUME", "HERMES");

    let file = FitsFile::new(vec![
        primary,
        image("relative error", vec![noise; POINTS]),
        image("unnormalised spectrum", unreduced),
        image("relative error", vec![25.0 / 850.0; POINTS]),
        image("bad pixels", badpix),
    ]);

    let output_path = "sample_galah.fits";
    file.write_to_path(output_path.as_ref())
        .with_context(|| format!("writing {output_path}"))?;

    println!(
        "Wrote {} HDUs ({} wavelengths each) to {output_path}",
        file.len(),
        wavelengths.len()
    );
    Ok(())
}
