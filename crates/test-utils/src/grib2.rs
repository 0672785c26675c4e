//! Synthetic GRIB2 message builder.
//!
//! Produces small, structurally valid GRIB2 messages with simple packing
//! (template 5.0). `NaN` data values are written as bitmap-masked points.

/// Grid geometry of a synthetic message.
#[derive(Debug, Clone)]
pub enum GridTemplate {
    /// Template 3.0, angles in degrees
    LatLon {
        ni: u32,
        nj: u32,
        la1: f64,
        lo1: f64,
        di: f64,
        dj: f64,
        scanning_mode: u8,
    },
    /// Template 3.30, angles in degrees and grid lengths in meters
    Lambert {
        nx: u32,
        ny: u32,
        la1: f64,
        lo1: f64,
        lov: f64,
        latin: f64,
        dx: f64,
        dy: f64,
        scanning_mode: u8,
    },
}

impl GridTemplate {
    fn num_points(&self) -> usize {
        match self {
            GridTemplate::LatLon { ni, nj, .. } => (*ni * *nj) as usize,
            GridTemplate::Lambert { nx, ny, .. } => (*nx * *ny) as usize,
        }
    }
}

/// Build a minimal GRIB2 message with the specified parameters
#[derive(Debug, Clone)]
pub struct Grib2Builder {
    discipline: u8,
    center: u16,
    year: u16,
    month: u8,
    day: u8,
    hour: u8,
    grid: GridTemplate,
    param_category: u8,
    param_number: u8,
    level_type: u8,
    level_scale: u8,
    level_value: u32,
    time_unit: u8,
    forecast_time: u32,
    decimal_scale: i16,
    data_values: Vec<f32>,
}

impl Default for Grib2Builder {
    fn default() -> Self {
        Self::new()
    }
}

impl Grib2Builder {
    /// Surface pressure on a 5x5, 0.5 degree grid from 32N 271E,
    /// run 2025-01-01 06z, forecast hour 0.
    pub fn new() -> Self {
        let grid = GridTemplate::LatLon {
            ni: 5,
            nj: 5,
            la1: 32.0,
            lo1: 271.0,
            di: 0.5,
            dj: 0.5,
            scanning_mode: 0x00,
        };
        let n = grid.num_points();
        Self {
            discipline: 0,
            center: 7, // NCEP
            year: 2025,
            month: 1,
            day: 1,
            hour: 6,
            grid,
            param_category: 3,
            param_number: 0,
            level_type: 1,
            level_scale: 0,
            level_value: 0,
            time_unit: 1,
            forecast_time: 0,
            decimal_scale: 0,
            data_values: vec![101_325.0; n],
        }
    }

    /// 2 m temperature (shortName `2t`)
    pub fn temperature_2m() -> Self {
        Self::new()
            .with_parameter(0, 0, 0)
            .with_level(103, 2)
            .with_constant_value(288.15)
    }

    /// 80 m wind component: `u` when `u_component` is true, else `v`
    pub fn wind_80m(u_component: bool) -> Self {
        Self::new()
            .with_parameter(0, 2, if u_component { 2 } else { 3 })
            .with_level(103, 80)
            .with_constant_value(5.0)
    }

    pub fn with_discipline(mut self, discipline: u8) -> Self {
        self.discipline = discipline;
        self
    }

    pub fn with_reference_time(mut self, year: u16, month: u8, day: u8, hour: u8) -> Self {
        self.year = year;
        self.month = month;
        self.day = day;
        self.hour = hour;
        self
    }

    /// Regular lat/lon grid, north to south, west to east.
    pub fn with_latlon_grid(mut self, ni: u32, nj: u32, la1: f64, lo1: f64, step: f64) -> Self {
        self.grid = GridTemplate::LatLon {
            ni,
            nj,
            la1,
            lo1,
            di: step,
            dj: step,
            scanning_mode: 0x00,
        };
        self.data_values = vec![0.0; self.grid.num_points()];
        self
    }

    /// Lambert conformal grid using the HRRR projection parameters.
    pub fn with_hrrr_lambert_grid(mut self, nx: u32, ny: u32) -> Self {
        self.grid = GridTemplate::Lambert {
            nx,
            ny,
            la1: 21.138123,
            lo1: 237.280472,
            lov: 262.5,
            latin: 38.5,
            dx: 3000.0,
            dy: 3000.0,
            scanning_mode: 0x40,
        };
        self.data_values = vec![0.0; self.grid.num_points()];
        self
    }

    pub fn with_grid_template(mut self, grid: GridTemplate) -> Self {
        self.grid = grid;
        self.data_values = vec![0.0; self.grid.num_points()];
        self
    }

    pub fn with_parameter(mut self, discipline: u8, category: u8, number: u8) -> Self {
        self.discipline = discipline;
        self.param_category = category;
        self.param_number = number;
        self
    }

    pub fn with_level(mut self, level_type: u8, level_value: u32) -> Self {
        self.level_type = level_type;
        self.level_scale = 0;
        self.level_value = level_value;
        self
    }

    pub fn with_scaled_level(mut self, level_type: u8, scale: u8, scaled_value: u32) -> Self {
        self.level_type = level_type;
        self.level_scale = scale;
        self.level_value = scaled_value;
        self
    }

    pub fn with_forecast_hour(mut self, hour: u32) -> Self {
        self.time_unit = 1;
        self.forecast_time = hour;
        self
    }

    /// Forecast time in an arbitrary code table 4.4 unit
    pub fn with_forecast_time(mut self, unit: u8, value: u32) -> Self {
        self.time_unit = unit;
        self.forecast_time = value;
        self
    }

    pub fn with_decimal_scale(mut self, decimal_scale: i16) -> Self {
        self.decimal_scale = decimal_scale;
        self
    }

    pub fn with_constant_value(mut self, value: f32) -> Self {
        self.data_values = vec![value; self.grid.num_points()];
        self
    }

    pub fn with_gradient(mut self, min_val: f32, max_val: f32) -> Self {
        let n = self.grid.num_points();
        self.data_values = (0..n)
            .map(|i| min_val + (max_val - min_val) * (i as f32 / n as f32))
            .collect();
        self
    }

    /// Values in scan order; `NaN` marks a missing point
    pub fn with_data(mut self, data: Vec<f32>) -> Self {
        self.data_values = data;
        self
    }

    /// Build the complete GRIB2 message bytes
    pub fn build(&self) -> Vec<u8> {
        let section1 = self.build_section1();
        let section3 = self.build_section3();
        let section4 = self.build_section4();
        let (section5, section6, section7) = self.build_data_sections();

        let message_length = 16
            + section1.len()
            + section3.len()
            + section4.len()
            + section5.len()
            + section6.len()
            + section7.len()
            + 4;

        let mut message = Vec::with_capacity(message_length);
        message.extend_from_slice(b"GRIB");
        message.extend_from_slice(&[0, 0]);
        message.push(self.discipline);
        message.push(2);
        message.extend_from_slice(&(message_length as u64).to_be_bytes());

        message.extend_from_slice(&section1);
        message.extend_from_slice(&section3);
        message.extend_from_slice(&section4);
        message.extend_from_slice(&section5);
        message.extend_from_slice(&section6);
        message.extend_from_slice(&section7);
        message.extend_from_slice(b"7777");

        message
    }

    /// Concatenate several messages into one file body.
    pub fn build_file(builders: &[Grib2Builder]) -> Vec<u8> {
        builders.iter().flat_map(|b| b.build()).collect()
    }

    fn build_section1(&self) -> Vec<u8> {
        let mut section = Vec::new();
        section.extend_from_slice(&21u32.to_be_bytes());
        section.push(1);

        section.extend_from_slice(&self.center.to_be_bytes());
        section.extend_from_slice(&0u16.to_be_bytes()); // Sub-center
        section.push(2); // Master table version
        section.push(1); // Local table version
        section.push(1); // Start of forecast

        section.extend_from_slice(&self.year.to_be_bytes());
        section.push(self.month);
        section.push(self.day);
        section.push(self.hour);
        section.push(0);
        section.push(0);

        section.push(0); // Operational
        section.push(1); // Forecast
        section
    }

    fn build_section3(&self) -> Vec<u8> {
        let mut gd = Vec::new();
        // Spherical earth, radius 6371229 m
        gd.push(6);
        gd.push(0);
        gd.extend_from_slice(&0u32.to_be_bytes());
        gd.push(0);
        gd.extend_from_slice(&0u32.to_be_bytes());
        gd.push(0);
        gd.extend_from_slice(&0u32.to_be_bytes());

        let template: u16 = match &self.grid {
            GridTemplate::LatLon {
                ni,
                nj,
                la1,
                lo1,
                di,
                dj,
                scanning_mode,
            } => {
                let j_sign = if scanning_mode & 0x40 != 0 { 1.0 } else { -1.0 };
                let la2 = la1 + j_sign * dj * (*nj as f64 - 1.0);
                let lo2 = lo1 + di * (*ni as f64 - 1.0);

                gd.extend_from_slice(&ni.to_be_bytes());
                gd.extend_from_slice(&nj.to_be_bytes());
                gd.extend_from_slice(&0u32.to_be_bytes()); // Basic angle
                gd.extend_from_slice(&0xFFFF_FFFFu32.to_be_bytes()); // Subdivisions
                gd.extend_from_slice(&micro_degrees(*la1));
                gd.extend_from_slice(&micro_degrees(*lo1));
                gd.push(48); // Resolution and component flags
                gd.extend_from_slice(&micro_degrees(la2));
                gd.extend_from_slice(&micro_degrees(lo2));
                gd.extend_from_slice(&((di * 1e6).round() as u32).to_be_bytes());
                gd.extend_from_slice(&((dj * 1e6).round() as u32).to_be_bytes());
                gd.push(*scanning_mode);
                0
            }
            GridTemplate::Lambert {
                nx,
                ny,
                la1,
                lo1,
                lov,
                latin,
                dx,
                dy,
                scanning_mode,
            } => {
                gd.extend_from_slice(&nx.to_be_bytes());
                gd.extend_from_slice(&ny.to_be_bytes());
                gd.extend_from_slice(&micro_degrees(*la1));
                gd.extend_from_slice(&micro_degrees(*lo1));
                gd.push(8); // Resolution and component flags
                gd.extend_from_slice(&micro_degrees(*latin)); // LaD
                gd.extend_from_slice(&micro_degrees(*lov));
                gd.extend_from_slice(&((dx * 1e3).round() as u32).to_be_bytes());
                gd.extend_from_slice(&((dy * 1e3).round() as u32).to_be_bytes());
                gd.push(0); // Projection centre flag
                gd.push(*scanning_mode);
                gd.extend_from_slice(&micro_degrees(*latin));
                gd.extend_from_slice(&micro_degrees(*latin));
                gd.extend_from_slice(&micro_degrees(-90.0)); // Southern pole latitude
                gd.extend_from_slice(&micro_degrees(0.0));
                30
            }
        };

        let mut section = Vec::new();
        section.extend_from_slice(&(14 + gd.len() as u32).to_be_bytes());
        section.push(3);
        section.push(0); // Source of grid definition
        section.extend_from_slice(&(self.grid.num_points() as u32).to_be_bytes());
        section.push(0);
        section.push(0);
        section.extend_from_slice(&template.to_be_bytes());
        section.extend_from_slice(&gd);
        section
    }

    fn build_section4(&self) -> Vec<u8> {
        let mut section = Vec::new();
        section.extend_from_slice(&34u32.to_be_bytes());
        section.push(4);

        section.extend_from_slice(&0u16.to_be_bytes()); // Coordinate values
        section.extend_from_slice(&0u16.to_be_bytes()); // Template 4.0

        section.push(self.param_category);
        section.push(self.param_number);
        section.push(2); // Forecast
        section.push(0);
        section.push(83); // HRRR generating process
        section.extend_from_slice(&0u16.to_be_bytes());
        section.push(0);
        section.push(self.time_unit);
        section.extend_from_slice(&self.forecast_time.to_be_bytes());

        section.push(self.level_type);
        section.push(self.level_scale);
        section.extend_from_slice(&self.level_value.to_be_bytes());

        section.push(255); // No second fixed surface
        section.push(255);
        section.extend_from_slice(&u32::MAX.to_be_bytes());
        section
    }

    /// Sections 5, 6 and 7 for simple packing with 16 bits per value.
    fn build_data_sections(&self) -> (Vec<u8>, Vec<u8>, Vec<u8>) {
        let decimal = 10f64.powi(self.decimal_scale as i32);
        let present: Vec<f64> = self
            .data_values
            .iter()
            .filter(|v| !v.is_nan())
            .map(|v| *v as f64 * decimal)
            .collect();

        let (min_val, max_val) = present
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(min, max), &v| {
                (min.min(v), max.max(v))
            });
        let reference_value = if present.is_empty() { 0.0 } else { min_val };
        let range = if present.is_empty() { 0.0 } else { max_val - min_val };

        let (bits_per_value, binary_scale_factor): (u8, i16) = if range == 0.0 {
            (0, 0)
        } else {
            (16, (range / 65535.0).log2().ceil() as i16)
        };
        let binary_scale = 2f64.powi(binary_scale_factor as i32);

        // Section 5
        let mut s5 = Vec::new();
        s5.extend_from_slice(&21u32.to_be_bytes());
        s5.push(5);
        s5.extend_from_slice(&(present.len() as u32).to_be_bytes());
        s5.extend_from_slice(&0u16.to_be_bytes());
        s5.extend_from_slice(&(reference_value as f32).to_be_bytes());
        s5.extend_from_slice(&sign_magnitude_i16(binary_scale_factor));
        s5.extend_from_slice(&sign_magnitude_i16(self.decimal_scale));
        s5.push(bits_per_value);
        s5.push(0);

        // Section 6
        let mut s6 = Vec::new();
        if self.data_values.iter().any(|v| v.is_nan()) {
            let mut bitmap = vec![0u8; self.data_values.len().div_ceil(8)];
            for (i, v) in self.data_values.iter().enumerate() {
                if !v.is_nan() {
                    bitmap[i / 8] |= 0x80 >> (i % 8);
                }
            }
            s6.extend_from_slice(&(6 + bitmap.len() as u32).to_be_bytes());
            s6.push(6);
            s6.push(0);
            s6.extend_from_slice(&bitmap);
        } else {
            s6.extend_from_slice(&6u32.to_be_bytes());
            s6.push(6);
            s6.push(255);
        }

        // Section 7
        let mut packed = Vec::new();
        if bits_per_value > 0 {
            let reference = reference_value as f32 as f64;
            for v in &present {
                let x = ((v - reference) / binary_scale).round().clamp(0.0, 65535.0) as u16;
                packed.extend_from_slice(&x.to_be_bytes());
            }
        }
        let mut s7 = Vec::new();
        s7.extend_from_slice(&(5 + packed.len() as u32).to_be_bytes());
        s7.push(7);
        s7.extend_from_slice(&packed);

        (s5, s6, s7)
    }
}

/// Encode degrees as 4-byte sign-magnitude microdegrees.
pub fn micro_degrees(degrees: f64) -> [u8; 4] {
    sign_magnitude_i32((degrees * 1e6).round() as i32)
}

pub fn sign_magnitude_i32(value: i32) -> [u8; 4] {
    let raw = if value < 0 {
        value.unsigned_abs() | 0x8000_0000
    } else {
        value as u32
    };
    raw.to_be_bytes()
}

pub fn sign_magnitude_i16(value: i16) -> [u8; 2] {
    let raw = if value < 0 {
        value.unsigned_abs() | 0x8000
    } else {
        value as u16
    };
    raw.to_be_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_message_framing() {
        let data = Grib2Builder::new().build();

        assert_eq!(&data[0..4], b"GRIB");
        assert_eq!(data[7], 2);
        assert_eq!(data[6], 0);
        assert_eq!(&data[data.len() - 4..], b"7777");

        let declared = u64::from_be_bytes(data[8..16].try_into().unwrap());
        assert_eq!(declared as usize, data.len());
    }

    #[test]
    fn test_sign_magnitude_encoding() {
        assert_eq!(sign_magnitude_i32(-1), [0x80, 0, 0, 1]);
        assert_eq!(sign_magnitude_i32(1), [0, 0, 0, 1]);
        assert_eq!(sign_magnitude_i16(-3), [0x80, 3]);
        assert_eq!(micro_degrees(-0.5), sign_magnitude_i32(-500_000));
    }

    #[test]
    fn test_build_file_concatenates() {
        let single = Grib2Builder::new().build();
        let file = Grib2Builder::build_file(&[Grib2Builder::new(), Grib2Builder::temperature_2m()]);
        assert_eq!(&file[..single.len()], single.as_slice());
        assert_eq!(&file[single.len()..single.len() + 4], b"GRIB");
    }

    #[test]
    fn test_bitmap_written_for_nan() {
        let mut values = vec![1.0; 25];
        values[3] = f32::NAN;
        let plain = Grib2Builder::new().with_constant_value(1.0).build();
        let masked = Grib2Builder::new().with_data(values).build();
        // Bitmap adds 4 bytes for 25 points
        assert_eq!(masked.len(), plain.len() + 4);
    }
}
