/// Linear attack-decay-sustain-release generator. Times are in seconds.
#[derive(Clone, Debug)]
pub struct Adsr {
  a: f32, d: f32, s: f32, r: f32, sr: f32,
  env: f32,
  gate: bool,
  attacking: bool,
}

impl Adsr {
  pub fn new(sr: f32) -> Self { Self { a: 0.01, d: 0.1, s: 0.8, r: 0.2, sr, env: 0.0, gate: false, attacking: false } }
  pub fn set(&mut self, a: f32, d: f32, s: f32, r: f32) { self.a = a.max(0.001); self.d = d.max(0.001); self.s = s.clamp(0.0, 1.0); self.r = r.max(0.001); }
  pub fn set_sustain(&mut self, s: f32) { self.s = s.clamp(0.0, 1.0); }
  pub fn sustain(&self) -> f32 { self.s }
  pub fn gate_on(&mut self) { self.gate = true; self.attacking = true; }
  pub fn gate_off(&mut self) { self.gate = false; self.attacking = false; }
  pub fn level(&self) -> f32 { self.env }
  pub fn reset(&mut self) { self.env = 0.0; self.gate = false; self.attacking = false; }

  pub fn next(&mut self) -> f32 {
    if self.gate {
      if self.attacking {
        if self.env < 1.0 { self.env += 1.0 / (self.a * self.sr); if self.env >= 1.0 { self.env = 1.0; self.attacking = false; } }
        else { self.attacking = false; }
      } else if self.env > self.s {
        // fall toward sustain, or rise if sustain moved up while held
        let dec = (1.0 - self.s).max(0.0001) / (self.d * self.sr);
        self.env -= dec;
        if self.env < self.s { self.env = self.s; }
      } else if self.env < self.s {
        let inc = self.s.max(0.0001) / (self.d * self.sr);
        self.env += inc;
        if self.env > self.s { self.env = self.s; }
      }
    } else if self.env > 0.0 {
      self.env -= 1.0 / (self.r * self.sr);
      if self.env < 0.0 { self.env = 0.0; }
    }
    self.env
  }
}
