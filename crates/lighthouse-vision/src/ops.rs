//! Pixel operations over interleaved 8-bit buffers.

pub fn resize_area(
    pixels: &[u8],
    width: usize,
    height: usize,
    channels: usize,
    new_width: usize,
    new_height: usize,
) -> Vec<u8> {
    assert_eq!(pixels.len(), width * height * channels);
    if width == 0 || height == 0 || new_width == 0 || new_height == 0 {
        return vec![0; new_width * new_height * channels];
    }
    let scale_x = width as f32 / new_width as f32;
    let scale_y = height as f32 / new_height as f32;
    let mut output = vec![0u8; new_width * new_height * channels];
    let mut sums = vec![0u32; channels];
    for ny in 0..new_height {
        let src_y0 = (ny as f32 * scale_y).floor() as usize;
        let src_y1 = (((ny + 1) as f32 * scale_y).ceil() as usize)
            .min(height)
            .max(src_y0 + 1);
        for nx in 0..new_width {
            let src_x0 = (nx as f32 * scale_x).floor() as usize;
            let src_x1 = (((nx + 1) as f32 * scale_x).ceil() as usize)
                .min(width)
                .max(src_x0 + 1);
            sums.fill(0);
            let mut count = 0u32;
            for sy in src_y0..src_y1 {
                for sx in src_x0..src_x1 {
                    let idx = (sy * width + sx) * channels;
                    for (c, sum) in sums.iter_mut().enumerate() {
                        *sum += pixels[idx + c] as u32;
                    }
                    count += 1;
                }
            }
            let out = (ny * new_width + nx) * channels;
            for (c, sum) in sums.iter().enumerate() {
                output[out + c] = ((*sum + count / 2) / count) as u8;
            }
        }
    }
    output
}

/// Single-channel bilinear resize with pixel-center alignment.
pub fn resize_bilinear(
    pixels: &[u8],
    width: usize,
    height: usize,
    new_width: usize,
    new_height: usize,
) -> Vec<u8> {
    assert_eq!(pixels.len(), width * height);
    if width == 0 || height == 0 || new_width == 0 || new_height == 0 {
        return vec![0; new_width * new_height];
    }
    let scale_x = width as f32 / new_width as f32;
    let scale_y = height as f32 / new_height as f32;
    let mut output = vec![0u8; new_width * new_height];
    for ny in 0..new_height {
        let fy = ((ny as f32 + 0.5) * scale_y - 0.5).clamp(0.0, (height - 1) as f32);
        let y0 = fy.floor() as usize;
        let y1 = (y0 + 1).min(height - 1);
        let wy = fy - y0 as f32;
        for nx in 0..new_width {
            let fx = ((nx as f32 + 0.5) * scale_x - 0.5).clamp(0.0, (width - 1) as f32);
            let x0 = fx.floor() as usize;
            let x1 = (x0 + 1).min(width - 1);
            let wx = fx - x0 as f32;
            let top = pixels[y0 * width + x0] as f32 * (1.0 - wx) + pixels[y0 * width + x1] as f32 * wx;
            let bottom =
                pixels[y1 * width + x0] as f32 * (1.0 - wx) + pixels[y1 * width + x1] as f32 * wx;
            output[ny * new_width + nx] = (top * (1.0 - wy) + bottom * wy).round() as u8;
        }
    }
    output
}

pub fn resize_nearest(
    pixels: &[u8],
    width: usize,
    height: usize,
    new_width: usize,
    new_height: usize,
) -> Vec<u8> {
    assert_eq!(pixels.len(), width * height);
    if width == 0 || height == 0 {
        return vec![0; new_width * new_height];
    }
    let mut output = vec![0u8; new_width * new_height];
    for ny in 0..new_height {
        let sy = (ny * height / new_height).min(height - 1);
        for nx in 0..new_width {
            let sx = (nx * width / new_width).min(width - 1);
            output[ny * new_width + nx] = pixels[sy * width + sx];
        }
    }
    output
}

/// Odd kernel size spanning three sigmas on each side.
pub fn kernel_size_for(sigma: f32) -> usize {
    (((sigma * 6.0 + 1.0).round() as usize) | 1).max(3)
}

pub fn gaussian_kernel(size: usize, sigma: f32) -> Vec<f32> {
    let size = size | 1;
    let radius = (size / 2) as isize;
    let denom = 2.0 * sigma * sigma;
    let mut kernel: Vec<f32> = (-radius..=radius)
        .map(|i| (-((i * i) as f32) / denom).exp())
        .collect();
    let total: f32 = kernel.iter().sum();
    for tap in kernel.iter_mut() {
        *tap /= total;
    }
    kernel
}

pub fn gaussian_blur(
    pixels: &[u8],
    width: usize,
    height: usize,
    channels: usize,
    sigma: f32,
) -> Vec<u8> {
    gaussian_blur_sized(pixels, width, height, channels, kernel_size_for(sigma), sigma)
}

pub fn gaussian_blur_sized(
    pixels: &[u8],
    width: usize,
    height: usize,
    channels: usize,
    size: usize,
    sigma: f32,
) -> Vec<u8> {
    assert_eq!(pixels.len(), width * height * channels);
    if width == 0 || height == 0 || sigma <= 0.0 {
        return pixels.to_vec();
    }
    let kernel = gaussian_kernel(size, sigma);
    let radius = (kernel.len() / 2) as isize;

    let mut horizontal = vec![0.0f32; pixels.len()];
    for y in 0..height {
        for x in 0..width {
            for c in 0..channels {
                let mut sum = 0.0;
                for (k, tap) in kernel.iter().enumerate() {
                    let sx = reflect_101(x as isize + k as isize - radius, width);
                    sum += pixels[(y * width + sx) * channels + c] as f32 * tap;
                }
                horizontal[(y * width + x) * channels + c] = sum;
            }
        }
    }

    let mut output = vec![0u8; pixels.len()];
    for y in 0..height {
        for x in 0..width {
            for c in 0..channels {
                let mut sum = 0.0;
                for (k, tap) in kernel.iter().enumerate() {
                    let sy = reflect_101(y as isize + k as isize - radius, height);
                    sum += horizontal[(sy * width + x) * channels + c] * tap;
                }
                output[(y * width + x) * channels + c] = sum.round().clamp(0.0, 255.0) as u8;
            }
        }
    }
    output
}

/// Mirrors out-of-range indices without repeating the border sample.
pub fn reflect_101(index: isize, len: usize) -> usize {
    if len == 1 {
        return 0;
    }
    let last = len as isize - 1;
    let mut i = index;
    loop {
        if i < 0 {
            i = -i;
        } else if i > last {
            i = 2 * last - i;
        } else {
            return i as usize;
        }
    }
}

pub fn absdiff(a: &[u8], b: &[u8]) -> Vec<u8> {
    assert_eq!(a.len(), b.len());
    a.iter().zip(b).map(|(&x, &y)| x.abs_diff(y)).collect()
}

/// Equal-weight average of the first `used` channels of each pixel. Every
/// channel is divided before summing, so rounding happens per channel.
pub fn average_channels(pixels: &[u8], channels: usize, used: usize) -> Vec<u8> {
    assert!(used > 0 && used <= channels);
    pixels
        .chunks_exact(channels)
        .map(|px| {
            let sum: u32 = px[..used]
                .iter()
                .map(|&v| (v as f32 / used as f32).round() as u32)
                .sum();
            sum.min(255) as u8
        })
        .collect()
}

/// Global threshold maximizing between-class variance.
pub fn otsu_threshold(pixels: &[u8]) -> u8 {
    let mut histogram = [0u64; 256];
    for &v in pixels {
        histogram[v as usize] += 1;
    }
    let total = pixels.len() as f64;
    let weighted_total: f64 = histogram
        .iter()
        .enumerate()
        .map(|(value, &count)| value as f64 * count as f64)
        .sum();

    let mut background_weight = 0.0f64;
    let mut background_sum = 0.0f64;
    let mut best_variance = 0.0f64;
    let mut threshold = 0u8;
    for (value, &count) in histogram.iter().enumerate() {
        background_weight += count as f64;
        if background_weight == 0.0 {
            continue;
        }
        let foreground_weight = total - background_weight;
        if foreground_weight == 0.0 {
            break;
        }
        background_sum += value as f64 * count as f64;
        let background_mean = background_sum / background_weight;
        let foreground_mean = (weighted_total - background_sum) / foreground_weight;
        let delta = background_mean - foreground_mean;
        let variance = background_weight * foreground_weight * delta * delta;
        if variance > best_variance {
            best_variance = variance;
            threshold = value as u8;
        }
    }
    threshold
}

/// Values strictly above `threshold` become 255, the rest 0.
pub fn threshold_binary(pixels: &[u8], threshold: u8) -> Vec<u8> {
    pixels
        .iter()
        .map(|&v| if v > threshold { 255 } else { 0 })
        .collect()
}
