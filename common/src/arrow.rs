//! A bouncing arrow drawn in place, so a board parked in a dead loop still shows it is alive.

/// backspace
const BS: u8 = 8;

/// A `|  >>    |` bar redrawn in place on every frame.
pub struct Arrow<T> {
    /// Columns between the two bars.
    inner: usize,
    pos: usize,
    forward: bool,
    print: T,
}

impl<T> Arrow<T>
where
    T: FnMut(&[u8]),
{
    /// Draws the first frame, `len` columns wide, through `print`.
    pub fn init(len: usize, print: T) -> Self {
        let mut ans = Self {
            inner: len.max(4) - 2,
            pos: 0,
            forward: true,
            print,
        };
        ans.draw();
        ans
    }

    /// Moves the arrow one column, turning at either bar.
    pub fn next(&mut self) {
        let end = if self.forward { self.inner - 2 } else { 0 };
        if self.pos == end {
            self.forward = !self.forward;
        } else if self.forward {
            self.pos += 1;
        } else {
            self.pos -= 1;
        }
        for _ in 0..self.inner + 2 {
            (self.print)(&[BS]);
        }
        self.draw();
    }

    fn draw(&mut self) {
        (self.print)(b"|");
        for _ in 0..self.pos {
            (self.print)(b" ");
        }
        (self.print)(if self.forward { b">>" } else { b"<<" });
        for _ in self.pos + 2..self.inner {
            (self.print)(b" ");
        }
        (self.print)(b"|");
    }
}
